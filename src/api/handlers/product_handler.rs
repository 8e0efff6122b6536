//! Product catalog and purchase handlers.

use axum::{
    extract::{Extension, Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::Product;
use crate::errors::AppResult;
use crate::services::Purchase;
use crate::types::Created;

/// Public catalog
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/products", get(list_products))
}

pub fn purchase_routes() -> Router<AppState> {
    Router::new().route("/products/:id/purchase", post(purchase))
}

/// Active products by VIP level
#[utoipa::path(
    get,
    path = "/products",
    tag = "Products",
    responses(
        (status = 200, description = "Products open for purchase", body = Vec<Product>)
    )
)]
pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.services.products().list_products().await?))
}

/// Buy a product with NSL
///
/// Starts an investment paying daily income and raises the buyer's VIP
/// level. The referrer, if any, receives a bonus.
#[utoipa::path(
    post,
    path = "/products/{id}/purchase",
    tag = "Products",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 201, description = "Investment started", body = Purchase),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product inactive or already held"),
        (status = 422, description = "Insufficient funds"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn purchase(
    Extension(current_user): Extension<CurrentUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Created<Purchase>> {
    let products = state.services.products();
    let purchase = state
        .with_wallet_lock(current_user.id, products.purchase(current_user.id, id))
        .await?;
    Ok(Created(purchase))
}
