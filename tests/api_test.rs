//! Integration tests for API endpoints.
//!
//! Routers run against hand-written service fakes, without a database or
//! Redis. Rate limiter layers are left out except where their Redis-less
//! behavior is under test.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    middleware, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use salon_money::api::handlers::{
    admin_routes, auth_routes, health_routes, product_routes, rate_routes, user_routes,
    wallet_routes,
};
use salon_money::api::middleware::{admin_middleware, auth_middleware};
use salon_money::api::{create_router, AppState};
use salon_money::domain::{
    AddressStatus, ExchangeRate, KycStatus, Product, ReferralSummary, Transaction,
    TransactionKind, TransactionStatus, User, UserRole,
};
use salon_money::errors::{AppError, AppResult};
use salon_money::services::{
    AddressService, ApprovalService, AuthService, Claims, IncomeService, KycService,
    ProductService, RateService, Registration, SecurityService, ServiceContainer, TokenResponse,
    UserService, WalletService, WalletSummary,
};
use salon_money::types::PaginationParams;

const USER_TOKEN: &str = "user-token";
const ADMIN_TOKEN: &str = "admin-token";

fn user(email: &str, role: UserRole) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "hashed".to_string(),
        name: "Test User".to_string(),
        role,
        referral_code: "K7M2Q9XA".to_string(),
        referred_by: None,
        balance_nsl: Decimal::new(1205, 1),
        balance_usdt: Decimal::from(40),
        vip_level: 1,
        kyc_status: KycStatus::None,
        kyc: None,
        kyc_rejection_reason: None,
        two_factor_secret: None,
        two_factor_enabled: false,
        withdrawal_address: None,
        withdrawal_network: None,
        address_status: AddressStatus::None,
        address_rejection_reason: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

// =============================================================================
// Service fakes
// =============================================================================

struct FakeAuth;

#[async_trait]
impl AuthService for FakeAuth {
    async fn register(&self, input: Registration) -> AppResult<User> {
        if input.email == "taken@example.com" {
            return Err(AppError::conflict("User"));
        }
        let mut user = user(&input.email, UserRole::User);
        user.name = input.name;
        Ok(user)
    }

    async fn login(
        &self,
        _email: String,
        password: String,
        _totp_code: Option<String>,
    ) -> AppResult<TokenResponse> {
        if password != "password123" {
            return Err(AppError::InvalidCredentials);
        }
        Ok(TokenResponse {
            access_token: USER_TOKEN.to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 86400,
        })
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let role = match token {
            USER_TOKEN => "user",
            ADMIN_TOKEN => "admin",
            _ => return Err(AppError::Unauthorized),
        };
        Ok(Claims {
            sub: Uuid::new_v4(),
            email: format!("{}@example.com", role),
            role: role.to_string(),
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
        })
    }
}

struct FakeUsers;

#[async_trait]
impl UserService for FakeUsers {
    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        let mut user = user("user@example.com", UserRole::User);
        user.id = id;
        Ok(user)
    }

    async fn get_user_with_deleted(&self, id: Uuid) -> AppResult<User> {
        self.get_user(id).await
    }

    async fn list_users(
        &self,
        _params: PaginationParams,
        _include_deleted: bool,
    ) -> AppResult<(Vec<User>, u64)> {
        Ok((
            vec![
                user("one@example.com", UserRole::User),
                user("two@example.com", UserRole::Admin),
            ],
            2,
        ))
    }

    async fn delete_user(&self, _id: Uuid) -> AppResult<()> {
        Ok(())
    }

    async fn restore_user(&self, id: Uuid) -> AppResult<User> {
        self.get_user(id).await
    }

    async fn referrals(&self, _id: Uuid) -> AppResult<Vec<ReferralSummary>> {
        Ok(vec![ReferralSummary::from(user(
            "friend@example.com",
            UserRole::User,
        ))])
    }
}

struct FakeWallet;

#[async_trait]
impl WalletService for FakeWallet {
    async fn wallet(&self, _user_id: Uuid) -> AppResult<WalletSummary> {
        Ok(WalletSummary {
            balance_nsl: Decimal::new(1205, 1),
            balance_usdt: Decimal::from(40),
            vip_level: 1,
            active_investments: 1,
            total_earned_nsl: Decimal::new(105, 1),
        })
    }

    async fn transactions(
        &self,
        _user_id: Uuid,
        _kind: Option<TransactionKind>,
        _status: Option<TransactionStatus>,
        _params: PaginationParams,
    ) -> AppResult<(Vec<Transaction>, u64)> {
        Ok((Vec::new(), 12))
    }

    async fn request_deposit(
        &self,
        _user_id: Uuid,
        _amount: Decimal,
        _reference: String,
    ) -> AppResult<Transaction> {
        Err(AppError::conflict("Deposit reference"))
    }

    async fn request_withdrawal(
        &self,
        _user_id: Uuid,
        _amount: Decimal,
        _totp_code: Option<String>,
    ) -> AppResult<Transaction> {
        Err(AppError::InsufficientFunds)
    }

    async fn convert(
        &self,
        _user_id: Uuid,
        _from: salon_money::domain::Currency,
        _amount: Decimal,
    ) -> AppResult<Transaction> {
        Err(AppError::invalid_state("No exchange rate has been set"))
    }
}

struct FakeRates;

fn rate(value: &str) -> ExchangeRate {
    ExchangeRate {
        id: Uuid::new_v4(),
        base: "NSL".to_string(),
        quote: "USDT".to_string(),
        rate: value.parse().unwrap(),
        set_by: None,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl RateService for FakeRates {
    async fn current(&self) -> AppResult<ExchangeRate> {
        Ok(rate("0.25"))
    }

    async fn history(&self, limit: u64) -> AppResult<Vec<ExchangeRate>> {
        Ok((0..limit.min(3)).map(|_| rate("0.2")).collect())
    }

    async fn set_rate(&self, admin_id: Uuid, value: Decimal) -> AppResult<ExchangeRate> {
        ExchangeRate::validate_rate(value)?;
        let mut rate = rate("1");
        rate.rate = value;
        rate.set_by = Some(admin_id);
        Ok(rate)
    }

    async fn market_price(&self, _symbol: String) -> AppResult<salon_money::services::MarketPrice> {
        Err(AppError::invalid_state("Exchange bridge is disabled"))
    }
}

struct FakeProducts;

fn product(level: i32) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: format!("VIP {}", level),
        vip_level: level,
        price_nsl: Decimal::from(100 * level),
        daily_income_nsl: Decimal::new(35, 1),
        duration_days: 30,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl ProductService for FakeProducts {
    async fn list_products(&self) -> AppResult<Vec<Product>> {
        Ok(vec![product(1), product(2)])
    }

    async fn list_all(&self) -> AppResult<Vec<Product>> {
        self.list_products().await
    }

    async fn create_product(
        &self,
        draft: salon_money::domain::ProductDraft,
    ) -> AppResult<Product> {
        draft.validate()?;
        Ok(product(draft.vip_level))
    }

    async fn update_product(
        &self,
        _id: Uuid,
        _changes: salon_money::domain::ProductChanges,
    ) -> AppResult<Product> {
        Err(AppError::NotFound)
    }

    async fn deactivate_product(&self, _id: Uuid) -> AppResult<Product> {
        Err(AppError::NotFound)
    }

    async fn purchase(
        &self,
        _user_id: Uuid,
        _product_id: Uuid,
    ) -> AppResult<salon_money::services::Purchase> {
        Err(AppError::InsufficientFunds)
    }

    async fn investments(&self, _user_id: Uuid) -> AppResult<Vec<salon_money::domain::Investment>> {
        Ok(Vec::new())
    }
}

/// Only the services these tests reach are wired.
struct FakeContainer;

impl ServiceContainer for FakeContainer {
    fn auth(&self) -> Arc<dyn AuthService> {
        Arc::new(FakeAuth)
    }

    fn users(&self) -> Arc<dyn UserService> {
        Arc::new(FakeUsers)
    }

    fn security(&self) -> Arc<dyn SecurityService> {
        unimplemented!("security service is not used by these tests")
    }

    fn kyc(&self) -> Arc<dyn KycService> {
        unimplemented!("kyc service is not used by these tests")
    }

    fn addresses(&self) -> Arc<dyn AddressService> {
        unimplemented!("address service is not used by these tests")
    }

    fn wallet(&self) -> Arc<dyn WalletService> {
        Arc::new(FakeWallet)
    }

    fn approvals(&self) -> Arc<dyn ApprovalService> {
        unimplemented!("approval service is not used by these tests")
    }

    fn products(&self) -> Arc<dyn ProductService> {
        Arc::new(FakeProducts)
    }

    fn income(&self) -> Arc<dyn IncomeService> {
        unimplemented!("income service is not used by these tests")
    }

    fn rates(&self) -> Arc<dyn RateService> {
        Arc::new(FakeRates)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn state() -> AppState {
    AppState::new(Arc::new(FakeContainer))
}

/// Production routes and auth layers, without rate limiting.
fn app() -> Router {
    let state = state();
    Router::new()
        .merge(health_routes())
        .nest("/auth", auth_routes())
        .merge(product_routes())
        .merge(rate_routes())
        .merge(
            user_routes()
                .merge(wallet_routes())
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/admin",
            admin_routes()
                .route_layer(middleware::from_fn(admin_middleware))
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .with_state(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// =============================================================================
// Public routes
// =============================================================================

#[tokio::test]
async fn test_current_rate_is_public() {
    let (status, body) = send(app(), get("/rates", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["base"], "NSL");
    assert_eq!(body["rate"], "0.25");
}

#[tokio::test]
async fn test_rate_history_honors_limit() {
    let (status, body) = send(app(), get("/rates/history?limit=2", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_product_catalog() {
    let (status, body) = send(app(), get("/products", None)).await;

    assert_eq!(status, StatusCode::OK);
    let products = body.as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["name"], "VIP 1");
}

#[tokio::test]
async fn test_health_without_infrastructure_is_degraded() {
    let (status, body) = send(app(), get("/health", None)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["redis"]["status"], "unhealthy");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_register_returns_created() {
    let request = post_json(
        "/auth/register",
        None,
        json!({"email": "new@example.com", "password": "password123", "name": "New User"}),
    );
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "new@example.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_validates_input() {
    let request = post_json(
        "/auth/register",
        None,
        json!({"email": "not-an-email", "password": "short", "name": "X"}),
    );
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let request = post_json(
        "/auth/register",
        None,
        json!({"email": "taken@example.com", "password": "password123", "name": "Dup"}),
    );
    let (status, _) = send(app(), request).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_returns_token() {
    let request = post_json(
        "/auth/login",
        None,
        json!({"email": "user@example.com", "password": "password123"}),
    );
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["access_token"], USER_TOKEN);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let request = post_json(
        "/auth/login",
        None,
        json!({"email": "user@example.com", "password": "wrong-password"}),
    );
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

// =============================================================================
// Account and wallet
// =============================================================================

#[tokio::test]
async fn test_account_requires_token() {
    let (status, _) = send(app(), get("/users/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(app(), get("/wallet", Some("forged"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_current_user_profile() {
    let (status, body) = send(app(), get("/users/me", Some(USER_TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    assert_eq!(body["balance_nsl"], "120.5");
}

#[tokio::test]
async fn test_referrals_listing() {
    let (status, body) = send(app(), get("/users/me/referrals", Some(USER_TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_wallet_summary() {
    let (status, body) = send(app(), get("/wallet", Some(USER_TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance_usdt"], "40");
    assert_eq!(body["active_investments"], 1);
}

#[tokio::test]
async fn test_transaction_history_pagination_meta() {
    let (status, body) = send(
        app(),
        get("/wallet/transactions?page=2&per_page=5&kind=deposit", Some(USER_TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["page"], 2);
    assert_eq!(body["meta"]["per_page"], 5);
    assert_eq!(body["meta"]["total"], 12);
    assert_eq!(body["meta"]["total_pages"], 3);
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let (status, body) = send(app(), get("/admin/users", Some(USER_TOKEN))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_admin_routes_require_login() {
    let (status, _) = send(app(), get("/admin/users", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_lists_users() {
    let (status, body) = send(app(), get("/admin/users?include_deleted=true", Some(ADMIN_TOKEN))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"]["total"], 2);
}

#[tokio::test]
async fn test_admin_sets_rate() {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/admin/rates")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN))
        .body(Body::from(json!({"rate": "0.3"}).to_string()))
        .unwrap();
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rate"], "0.3");
}

#[tokio::test]
async fn test_admin_rejects_zero_rate() {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/admin/rates")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN))
        .body(Body::from(json!({"rate": "0"}).to_string()))
        .unwrap();
    let (status, _) = send(app(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_creates_product() {
    let request = post_json(
        "/admin/products",
        Some(ADMIN_TOKEN),
        json!({
            "name": "VIP 3",
            "vip_level": 3,
            "price_nsl": "500",
            "daily_income_nsl": "20",
            "duration_days": 45
        }),
    );
    let (status, body) = send(app(), request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["vip_level"], 3);
}

#[tokio::test]
async fn test_market_price_without_bridge() {
    let (status, body) = send(
        app(),
        get("/admin/rates/market?symbol=btcusdt", Some(ADMIN_TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

// =============================================================================
// Full router
// =============================================================================

#[tokio::test]
async fn test_rate_limiter_fails_closed_without_redis() {
    let router = create_router(state());
    let response = router.oneshot(get("/rates", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn test_full_router_serves_health_unlimited() {
    let router = create_router(state());
    let response = router.oneshot(get("/health", None)).await.unwrap();

    // Degraded, but not rate limited
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let router = create_router(state());
    let (status, body) = send(router, get("/api-docs/openapi.json", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Salon Money API");
}
