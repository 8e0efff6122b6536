//! Public exchange rate handlers.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::AppState;
use crate::config::DEFAULT_RATE_HISTORY;
use crate::domain::ExchangeRate;
use crate::errors::AppResult;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Entries to return, at most 100
    pub limit: Option<u64>,
}

pub fn rate_routes() -> Router<AppState> {
    Router::new()
        .route("/rates", get(current_rate))
        .route("/rates/history", get(rate_history))
}

/// Current NSL/USDT rate
#[utoipa::path(
    get,
    path = "/rates",
    tag = "Rates",
    responses(
        (status = 200, description = "Current rate", body = ExchangeRate),
        (status = 404, description = "No rate has been set")
    )
)]
pub async fn current_rate(State(state): State<AppState>) -> AppResult<Json<ExchangeRate>> {
    Ok(Json(state.services.rates().current().await?))
}

/// Past rates, newest first
#[utoipa::path(
    get,
    path = "/rates/history",
    tag = "Rates",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Rate history", body = Vec<ExchangeRate>)
    )
)]
pub async fn rate_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ExchangeRate>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RATE_HISTORY);
    Ok(Json(state.services.rates().history(limit).await?))
}
