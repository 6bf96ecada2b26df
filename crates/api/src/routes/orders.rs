//! Order history.

use axum::{
    Json,
    extract::{Path, State},
};

use cartline_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::state::AppState;

/// The caller's orders that are still being delivered.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = state
        .orders()
        .list_for_user(claims.sub, OrderStatus::Delivering)
        .await?;
    Ok(Json(orders))
}

/// One of the caller's orders.
///
/// Orders owned by someone else are reported as not found.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let order_id: OrderId = id
        .parse()
        .map_err(|_| AppError::Validation("Invalid order id".to_string()))?;

    state
        .orders()
        .get_for_user(claims.sub, order_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}
