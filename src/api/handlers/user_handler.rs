//! Account handlers for the signed-in user: profile, referrals, KYC,
//! withdrawal address and two-factor settings.

use axum::{
    extract::{Extension, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::{JsonBody, ValidatedJson};
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{AddressInfo, KycDetails, KycRecord, Network, ReferralSummary, UserResponse};
use crate::errors::AppResult;
use crate::services::TwoFactorSetup;
use crate::types::MessageResponse;

/// Withdrawal address submission
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddressRequest {
    pub network: Network,
    #[validate(length(min = 1, max = 128, message = "Address is required"))]
    #[schema(example = "TJRabPrwbZy45sbavfcjinPJC18kjpRTv8")]
    pub address: String,
}

/// Authenticator code confirming a 2FA change
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TwoFactorCodeRequest {
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    #[schema(example = "492039")]
    pub code: String,
}

/// Account routes on the general rate limit tier
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_current_user))
        .route("/users/me/referrals", get(list_referrals))
        .route("/users/me/kyc", get(get_kyc).post(submit_kyc))
}

/// Account routes that change how money can leave the account
pub fn user_security_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me/address", put(submit_address))
        .route("/users/me/2fa/setup", post(setup_two_factor))
        .route("/users/me/2fa/enable", post(enable_two_factor))
        .route("/users/me/2fa/disable", post(disable_two_factor))
}

/// Get current authenticated user
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_current_user(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> AppResult<Json<UserResponse>> {
    let user = state.services.users().get_user(current_user.id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Users who signed up with my referral code
#[utoipa::path(
    get,
    path = "/users/me/referrals",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Referred users", body = Vec<ReferralSummary>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_referrals(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ReferralSummary>>> {
    let referrals = state.services.users().referrals(current_user.id).await?;
    Ok(Json(referrals))
}

#[utoipa::path(
    get,
    path = "/users/me/kyc",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "KYC status", body = KycRecord),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_kyc(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> AppResult<Json<KycRecord>> {
    Ok(Json(state.services.kyc().status(current_user.id).await?))
}

/// Submit identity details for review
#[utoipa::path(
    post,
    path = "/users/me/kyc",
    tag = "Account",
    security(("bearer_auth" = [])),
    request_body = KycDetails,
    responses(
        (status = 200, description = "Submission queued for review", body = KycRecord),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Already pending or approved")
    )
)]
pub async fn submit_kyc(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    JsonBody(details): JsonBody<KycDetails>,
) -> AppResult<Json<KycRecord>> {
    Ok(Json(
        state.services.kyc().submit(current_user.id, details).await?,
    ))
}

/// Set the withdrawal address
///
/// The address is checked against the exchange's rules for the network
/// when the exchange bridge is enabled; otherwise it waits for an admin.
#[utoipa::path(
    put,
    path = "/users/me/address",
    tag = "Account",
    security(("bearer_auth" = [])),
    request_body = AddressRequest,
    responses(
        (status = 200, description = "Address stored with its verification status", body = AddressInfo),
        (status = 400, description = "Malformed address"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn submit_address(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<AddressRequest>,
) -> AppResult<Json<AddressInfo>> {
    let info = state
        .services
        .addresses()
        .submit_address(current_user.id, payload.network, payload.address)
        .await?;
    Ok(Json(info))
}

/// Start two-factor enrollment
#[utoipa::path(
    post,
    path = "/users/me/2fa/setup",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New secret, not yet active", body = TwoFactorSetup),
        (status = 409, description = "2FA already enabled")
    )
)]
pub async fn setup_two_factor(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
) -> AppResult<Json<TwoFactorSetup>> {
    Ok(Json(
        state.services.security().setup_two_factor(current_user.id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/users/me/2fa/enable",
    tag = "Account",
    security(("bearer_auth" = [])),
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "2FA enabled", body = MessageResponse),
        (status = 401, description = "Wrong code"),
        (status = 409, description = "No pending setup or already enabled")
    )
)]
pub async fn enable_two_factor(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<TwoFactorCodeRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .security()
        .enable_two_factor(current_user.id, payload.code)
        .await?;
    Ok(Json(MessageResponse::new("Two-factor authentication enabled")))
}

#[utoipa::path(
    post,
    path = "/users/me/2fa/disable",
    tag = "Account",
    security(("bearer_auth" = [])),
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "2FA disabled", body = MessageResponse),
        (status = 401, description = "Wrong code"),
        (status = 409, description = "2FA not enabled")
    )
)]
pub async fn disable_two_factor(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<TwoFactorCodeRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .security()
        .disable_two_factor(current_user.id, payload.code)
        .await?;
    Ok(Json(MessageResponse::new("Two-factor authentication disabled")))
}
