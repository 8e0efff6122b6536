//! OpenAPI documentation configuration.
//!
//! Served through Swagger UI at `/swagger-ui`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    admin_handler, auth_handler, product_handler, rate_handler, user_handler, wallet_handler,
};
use crate::domain::{
    AddressInfo, AddressStatus, Currency, DocumentType, ExchangeRate, Investment,
    InvestmentStatus, KycDetails, KycRecord, KycStatus, Network, PayoutSummary, Product,
    ProductChanges, ProductDraft, ReferralSummary, Transaction, TransactionKind,
    TransactionStatus, UserResponse, UserRole,
};
use crate::services::{
    KycSubmission, MarketPrice, Purchase, TokenResponse, TwoFactorSetup, WalletSummary,
};
use crate::types::{MessageResponse, PaginatedTransactions, PaginatedUsers, PaginationMeta};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Salon Money API",
        version = "0.1.0",
        description = "VIP investment platform with NSL/USDT wallets, referrals and an exchange bridge"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        auth_handler::register,
        auth_handler::login,
        user_handler::get_current_user,
        user_handler::list_referrals,
        user_handler::get_kyc,
        user_handler::submit_kyc,
        user_handler::submit_address,
        user_handler::setup_two_factor,
        user_handler::enable_two_factor,
        user_handler::disable_two_factor,
        wallet_handler::get_wallet,
        wallet_handler::list_transactions,
        wallet_handler::list_investments,
        wallet_handler::request_deposit,
        wallet_handler::request_withdrawal,
        wallet_handler::convert,
        product_handler::list_products,
        product_handler::purchase,
        rate_handler::current_rate,
        rate_handler::rate_history,
        admin_handler::list_transactions,
        admin_handler::approve_transaction,
        admin_handler::reject_transaction,
        admin_handler::list_users,
        admin_handler::get_user,
        admin_handler::delete_user,
        admin_handler::restore_user,
        admin_handler::adjust_balance,
        admin_handler::list_pending_kyc,
        admin_handler::approve_kyc,
        admin_handler::reject_kyc,
        admin_handler::verify_address,
        admin_handler::reject_address,
        admin_handler::list_products,
        admin_handler::create_product,
        admin_handler::update_product,
        admin_handler::deactivate_product,
        admin_handler::set_rate,
        admin_handler::market_price,
        admin_handler::run_payouts,
    ),
    components(
        schemas(
            // Domain types
            UserRole,
            UserResponse,
            ReferralSummary,
            AddressInfo,
            AddressStatus,
            Network,
            KycDetails,
            KycRecord,
            KycStatus,
            DocumentType,
            Currency,
            Transaction,
            TransactionKind,
            TransactionStatus,
            Product,
            ProductDraft,
            ProductChanges,
            Investment,
            InvestmentStatus,
            PayoutSummary,
            ExchangeRate,
            // Service results
            TokenResponse,
            TwoFactorSetup,
            WalletSummary,
            Purchase,
            KycSubmission,
            MarketPrice,
            // Envelopes
            MessageResponse,
            PaginationMeta,
            PaginatedTransactions,
            PaginatedUsers,
            // Request bodies
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            user_handler::AddressRequest,
            user_handler::TwoFactorCodeRequest,
            wallet_handler::DepositRequest,
            wallet_handler::WithdrawalRequest,
            wallet_handler::ConvertRequest,
            admin_handler::ApproveRequest,
            admin_handler::RejectRequest,
            admin_handler::AdjustBalanceRequest,
            admin_handler::SetRateRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration and login"),
        (name = "Account", description = "Profile, referrals, KYC, withdrawal address and 2FA"),
        (name = "Wallet", description = "Balances, ledger, deposits, withdrawals and conversions"),
        (name = "Products", description = "VIP products and purchases"),
        (name = "Rates", description = "NSL/USDT exchange rate"),
        (name = "Admin", description = "Approvals, users, products, rates and payouts")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT token obtained from /auth/login"))
                        .build(),
                ),
            );
        }
    }
}
