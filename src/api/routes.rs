//! Application route configuration.
//!
//! Rate limit tiers: `/auth` gets the strict auth tier, money-moving and
//! security-sensitive routes the sensitive tier, everything else the
//! general tier. Health checks are not limited.

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    admin_routes, auth_routes, health_routes, product_routes, purchase_routes, rate_routes,
    user_routes, user_security_routes, wallet_money_routes, wallet_routes,
};
use super::middleware::{
    admin_middleware, auth_middleware, rate_limit_auth_middleware, rate_limit_middleware,
    rate_limit_sensitive_middleware,
};
use super::openapi::ApiDoc;
use super::AppState;

/// Create the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest(
            "/auth",
            auth_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_auth_middleware,
            )),
        )
        .merge(public_routes(state.clone()))
        .merge(account_routes(state.clone()))
        .merge(sensitive_routes(state.clone()))
        .nest("/admin", protected_admin_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Catalog and rates, no login
fn public_routes(state: AppState) -> Router<AppState> {
    product_routes()
        .merge(rate_routes())
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

/// Signed-in reads and profile changes
fn account_routes(state: AppState) -> Router<AppState> {
    user_routes()
        .merge(wallet_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}

/// Deposits, withdrawals, conversions, purchases, address and 2FA changes
fn sensitive_routes(state: AppState) -> Router<AppState> {
    user_security_routes()
        .merge(wallet_money_routes())
        .merge(purchase_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .route_layer(middleware::from_fn_with_state(
            state,
            rate_limit_sensitive_middleware,
        ))
}

fn protected_admin_routes(state: AppState) -> Router<AppState> {
    admin_routes()
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}
