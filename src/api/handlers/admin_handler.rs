//! Admin handlers: transaction review, users, KYC and address review,
//! products, exchange rates and payouts.
//!
//! Mounted under `/admin` behind the auth and admin middleware.

use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::{JsonBody, ValidatedJson};
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{
    AddressInfo, Currency, ExchangeRate, KycRecord, PayoutSummary, Product, ProductChanges,
    ProductDraft, Transaction, TransactionFilter, TransactionKind, TransactionStatus,
    UserResponse,
};
use crate::errors::AppResult;
use crate::services::{KycSubmission, MarketPrice};
use crate::types::{Created, NoContent, Paginated, PaginationParams};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminTransactionQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub user_id: Option<Uuid>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Include soft-deleted users
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MarketQuery {
    /// Exchange symbol, e.g. BTCUSDT
    pub symbol: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ApproveRequest {
    #[validate(length(max = 500, message = "Note is too long"))]
    pub note: Option<String>,
}

/// Reason shown to the user
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    #[schema(example = "Reference not found on the exchange")]
    pub reason: String,
}

/// Manual balance correction
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustBalanceRequest {
    pub currency: Currency,
    /// Positive to credit, negative to debit
    #[schema(value_type = String, example = "-12.5")]
    pub amount: Decimal,
    #[validate(length(min = 1, max = 500, message = "Note must be 1-500 characters"))]
    #[schema(example = "Refund for duplicate fee")]
    pub note: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetRateRequest {
    /// USDT per NSL
    #[schema(value_type = String, example = "0.25")]
    pub rate: Decimal,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/:id/approve", post(approve_transaction))
        .route("/transactions/:id/reject", post(reject_transaction))
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/restore", post(restore_user))
        .route("/users/:id/adjust", post(adjust_balance))
        .route("/users/:id/kyc/approve", post(approve_kyc))
        .route("/users/:id/kyc/reject", post(reject_kyc))
        .route("/users/:id/address/verify", post(verify_address))
        .route("/users/:id/address/reject", post(reject_address))
        .route("/kyc", get(list_pending_kyc))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", put(update_product).delete(deactivate_product))
        .route("/rates", put(set_rate))
        .route("/rates/market", get(market_price))
        .route("/payouts/run", post(run_payouts))
}

// =============================================================================
// Transactions
// =============================================================================

/// Transactions across all users, newest first
#[utoipa::path(
    get,
    path = "/admin/transactions",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(AdminTransactionQuery),
    responses(
        (status = 200, description = "One page of transactions", body = PaginatedTransactions),
        (status = 403, description = "Forbidden - Admin only")
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<AdminTransactionQuery>,
) -> AppResult<Json<Paginated<Transaction>>> {
    let params = PaginationParams::new(query.page, query.per_page);
    let filter = TransactionFilter {
        user_id: query.user_id,
        kind: query.kind,
        status: query.status,
    };
    let (items, total) = state
        .services
        .approvals()
        .list_transactions(filter, params)
        .await?;
    Ok(Json(Paginated::new(items, &params, total)))
}

/// Approve a pending deposit or withdrawal
///
/// Deposits are checked against the exchange deposit history and credited.
/// Withdrawals are sent to the exchange.
#[utoipa::path(
    post,
    path = "/admin/transactions/{id}/approve",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Transaction ID")),
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Approved", body = Transaction),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Not pending, or deposit not confirmed"),
        (status = 502, description = "Exchange error")
    )
)]
pub async fn approve_transaction(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ApproveRequest>,
) -> AppResult<Json<Transaction>> {
    let tx = state
        .services
        .approvals()
        .approve(admin.id, id, payload.note)
        .await?;
    Ok(Json(tx))
}

/// Reject a pending transaction; withdrawals are refunded
#[utoipa::path(
    post,
    path = "/admin/transactions/{id}/reject",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Transaction ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected", body = Transaction),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Not pending")
    )
)]
pub async fn reject_transaction(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RejectRequest>,
) -> AppResult<Json<Transaction>> {
    let tx = state
        .services
        .approvals()
        .reject(admin.id, id, payload.reason)
        .await?;
    Ok(Json(tx))
}

// =============================================================================
// Users
// =============================================================================

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(UserListQuery),
    responses(
        (status = 200, description = "One page of users", body = PaginatedUsers),
        (status = 403, description = "Forbidden - Admin only")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Paginated<UserResponse>>> {
    let params = PaginationParams::new(query.page, query.per_page);
    let (users, total) = state
        .services
        .users()
        .list_users(params, query.include_deleted)
        .await?;
    Ok(Json(
        Paginated::new(users, &params, total).map(UserResponse::from),
    ))
}

/// Any user, including soft-deleted ones
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.users().get_user_with_deleted(id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Soft delete a user
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Admins cannot be deleted")
    )
)]
pub async fn delete_user(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.users().delete_user(id).await?;
    tracing::info!(admin_id = %admin.id, user_id = %id, "User deleted");
    Ok(NoContent)
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/restore",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User restored", body = UserResponse),
        (status = 404, description = "User not found"),
        (status = 409, description = "User is not deleted")
    )
)]
pub async fn restore_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.users().restore_user(id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Credit or debit a balance with an audit entry
#[utoipa::path(
    post,
    path = "/admin/users/{id}/adjust",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AdjustBalanceRequest,
    responses(
        (status = 201, description = "Adjustment recorded", body = Transaction),
        (status = 400, description = "Zero amount or missing note"),
        (status = 422, description = "Debit exceeds balance")
    )
)]
pub async fn adjust_balance(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AdjustBalanceRequest>,
) -> AppResult<Created<Transaction>> {
    let approvals = state.services.approvals();
    let tx = state
        .with_wallet_lock(
            id,
            approvals.adjust_balance(admin.id, id, payload.currency, payload.amount, payload.note),
        )
        .await?;
    Ok(Created(tx))
}

// =============================================================================
// KYC and withdrawal addresses
// =============================================================================

/// Submissions waiting for review, oldest first
#[utoipa::path(
    get,
    path = "/admin/kyc",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending submissions", body = Vec<KycSubmission>)
    )
)]
pub async fn list_pending_kyc(State(state): State<AppState>) -> AppResult<Json<Vec<KycSubmission>>> {
    Ok(Json(state.services.kyc().list_pending().await?))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/kyc/approve",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "KYC approved", body = KycRecord),
        (status = 409, description = "Nothing pending")
    )
)]
pub async fn approve_kyc(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<KycRecord>> {
    Ok(Json(state.services.kyc().approve(admin.id, id).await?))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/kyc/reject",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "KYC rejected", body = KycRecord),
        (status = 409, description = "Nothing pending")
    )
)]
pub async fn reject_kyc(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RejectRequest>,
) -> AppResult<Json<KycRecord>> {
    Ok(Json(
        state
            .services
            .kyc()
            .reject(admin.id, id, payload.reason)
            .await?,
    ))
}

/// Verify a pending address by hand (manual mode)
#[utoipa::path(
    post,
    path = "/admin/users/{id}/address/verify",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Address verified", body = AddressInfo),
        (status = 409, description = "No pending address")
    )
)]
pub async fn verify_address(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AddressInfo>> {
    Ok(Json(
        state.services.addresses().verify_address(admin.id, id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/address/reject",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Address rejected", body = AddressInfo),
        (status = 409, description = "No pending address")
    )
)]
pub async fn reject_address(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RejectRequest>,
) -> AppResult<Json<AddressInfo>> {
    Ok(Json(
        state
            .services
            .addresses()
            .reject_address(admin.id, id, payload.reason)
            .await?,
    ))
}

// =============================================================================
// Products
// =============================================================================

/// Every product including inactive ones
#[utoipa::path(
    get,
    path = "/admin/products",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All products", body = Vec<Product>)
    )
)]
pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.services.products().list_all().await?))
}

#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = ProductDraft,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid terms"),
        (status = 409, description = "VIP level already has a product")
    )
)]
pub async fn create_product(
    State(state): State<AppState>,
    JsonBody(draft): JsonBody<ProductDraft>,
) -> AppResult<Created<Product>> {
    Ok(Created(state.services.products().create_product(draft).await?))
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductChanges,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, description = "Invalid or empty changes"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "VIP level already has a product")
    )
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(changes): JsonBody<ProductChanges>,
) -> AppResult<Json<Product>> {
    Ok(Json(
        state.services.products().update_product(id, changes).await?,
    ))
}

/// Withdraw a product from sale; running investments continue
#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deactivated", body = Product),
        (status = 404, description = "Product not found")
    )
)]
pub async fn deactivate_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.services.products().deactivate_product(id).await?))
}

// =============================================================================
// Rates and payouts
// =============================================================================

#[utoipa::path(
    put,
    path = "/admin/rates",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = SetRateRequest,
    responses(
        (status = 200, description = "New current rate", body = ExchangeRate),
        (status = 400, description = "Rate must be positive")
    )
)]
pub async fn set_rate(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SetRateRequest>,
) -> AppResult<Json<ExchangeRate>> {
    Ok(Json(
        state.services.rates().set_rate(admin.id, payload.rate).await?,
    ))
}

/// Exchange ticker price, for reference when setting the rate
#[utoipa::path(
    get,
    path = "/admin/rates/market",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(MarketQuery),
    responses(
        (status = 200, description = "Ticker price", body = MarketPrice),
        (status = 409, description = "Exchange bridge disabled"),
        (status = 502, description = "Exchange error")
    )
)]
pub async fn market_price(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> AppResult<Json<MarketPrice>> {
    Ok(Json(state.services.rates().market_price(query.symbol).await?))
}

/// Distribute income for every due investment now
#[utoipa::path(
    post,
    path = "/admin/payouts/run",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Run summary", body = PayoutSummary)
    )
)]
pub async fn run_payouts(
    Extension(admin): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> AppResult<Json<PayoutSummary>> {
    tracing::info!(admin_id = %admin.id, "Manual payout run");
    Ok(Json(state.services.income().distribute_due(Utc::now()).await?))
}
