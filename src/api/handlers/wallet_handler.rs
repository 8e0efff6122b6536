//! Wallet handlers: balances, ledger history, deposits, withdrawals and
//! conversions.
//!
//! Money-moving endpoints run under the per-user wallet lock.

use axum::{
    extract::{Extension, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{Currency, Investment, Transaction, TransactionKind, TransactionStatus};
use crate::errors::AppResult;
use crate::services::WalletSummary;
use crate::types::{Created, Paginated, PaginationParams};

/// Filters for the ledger history
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
}

/// Claim for a USDT deposit already sent to the platform's exchange account
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DepositRequest {
    #[schema(value_type = String, example = "100")]
    pub amount: Decimal,
    /// Exchange transaction id (txid) of the transfer
    #[validate(length(min = 1, max = 128, message = "Reference is required"))]
    #[schema(example = "0x5f2e9c0b7d1a4e3f8c6b2a9d0e1f4c7b8a3d6e9f0c1b2a3d4e5f6a7b8c9d0e1f")]
    pub reference: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct WithdrawalRequest {
    /// Gross USDT amount; the fee is deducted from it
    #[schema(value_type = String, example = "50")]
    pub amount: Decimal,
    /// Required when 2FA is enabled
    #[schema(example = "492039")]
    pub totp_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConvertRequest {
    /// Currency to sell; the other one is bought
    pub from: Currency,
    #[schema(value_type = String, example = "250")]
    pub amount: Decimal,
}

/// Read-only wallet routes
pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/wallet", get(get_wallet))
        .route("/wallet/transactions", get(list_transactions))
        .route("/wallet/investments", get(list_investments))
}

/// Money-moving wallet routes
pub fn wallet_money_routes() -> Router<AppState> {
    Router::new()
        .route("/wallet/deposits", post(request_deposit))
        .route("/wallet/withdrawals", post(request_withdrawal))
        .route("/wallet/convert", post(convert))
}

#[utoipa::path(
    get,
    path = "/wallet",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Balances and earnings", body = WalletSummary),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_wallet(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> AppResult<Json<WalletSummary>> {
    Ok(Json(state.services.wallet().wallet(current_user.id).await?))
}

/// My ledger, newest first
#[utoipa::path(
    get,
    path = "/wallet/transactions",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    params(TransactionQuery),
    responses(
        (status = 200, description = "One page of transactions", body = PaginatedTransactions),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_transactions(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> AppResult<Json<Paginated<Transaction>>> {
    let params = PaginationParams::new(query.page, query.per_page);
    let (items, total) = state
        .services
        .wallet()
        .transactions(current_user.id, query.kind, query.status, params)
        .await?;
    Ok(Json(Paginated::new(items, &params, total)))
}

#[utoipa::path(
    get,
    path = "/wallet/investments",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "My investments", body = Vec<Investment>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_investments(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Investment>>> {
    Ok(Json(
        state.services.products().investments(current_user.id).await?,
    ))
}

/// Claim a deposit; credited once an admin approves it
#[utoipa::path(
    post,
    path = "/wallet/deposits",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    request_body = DepositRequest,
    responses(
        (status = 201, description = "Pending deposit created", body = Transaction),
        (status = 400, description = "Below minimum or invalid"),
        (status = 409, description = "Reference already claimed"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn request_deposit(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<DepositRequest>,
) -> AppResult<Created<Transaction>> {
    let wallet = state.services.wallet();
    let tx = state
        .with_wallet_lock(
            current_user.id,
            wallet.request_deposit(current_user.id, payload.amount, payload.reference),
        )
        .await?;
    Ok(Created(tx))
}

/// Hold funds and queue a withdrawal to the verified address
#[utoipa::path(
    post,
    path = "/wallet/withdrawals",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    request_body = WithdrawalRequest,
    responses(
        (status = 201, description = "Pending withdrawal created", body = Transaction),
        (status = 400, description = "Below minimum or invalid"),
        (status = 401, description = "Missing or wrong 2FA code"),
        (status = 409, description = "KYC not approved or address not verified"),
        (status = 422, description = "Insufficient funds"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn request_withdrawal(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<WithdrawalRequest>,
) -> AppResult<Created<Transaction>> {
    let wallet = state.services.wallet();
    let tx = state
        .with_wallet_lock(
            current_user.id,
            wallet.request_withdrawal(current_user.id, payload.amount, payload.totp_code),
        )
        .await?;
    Ok(Created(tx))
}

/// Convert between NSL and USDT at the current rate
#[utoipa::path(
    post,
    path = "/wallet/convert",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    request_body = ConvertRequest,
    responses(
        (status = 201, description = "Completed conversion", body = Transaction),
        (status = 409, description = "No exchange rate set"),
        (status = 422, description = "Insufficient funds"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn convert(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ConvertRequest>,
) -> AppResult<Created<Transaction>> {
    let wallet = state.services.wallet();
    let tx = state
        .with_wallet_lock(
            current_user.id,
            wallet.convert(current_user.id, payload.from, payload.amount),
        )
        .await?;
    Ok(Created(tx))
}
