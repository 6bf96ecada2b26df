//! Cart route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use cartline_core::{CartItemId, CartLine, ProductId};

use super::ApiJson;
use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

fn parse_cart_item_id(id: &str) -> Result<CartItemId> {
    id.parse()
        .map_err(|_| AppError::Validation("Invalid cart item id".to_string()))
}

fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(AppError::Validation(
            "Quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

fn not_found() -> AppError {
    AppError::NotFound("Cart item not found".to_string())
}

/// The caller's cart, joined with live product data.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Vec<CartLine>>> {
    Ok(Json(state.carts().lines_for_user(claims.sub).await?))
}

/// Add a product to the caller's cart.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    ApiJson(body): ApiJson<AddCartItemRequest>,
) -> Result<(StatusCode, Json<CartLine>)> {
    validate_quantity(body.quantity)?;

    let line = state
        .carts()
        .add_item(claims.sub, body.product_id, body.quantity)
        .await?;

    tracing::info!(user_id = %claims.sub, product_id = %line.product_id, "Added to cart");
    Ok((StatusCode::CREATED, Json(line)))
}

/// One line of the caller's cart.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<CartLine>> {
    state
        .carts()
        .get_item(claims.sub, parse_cart_item_id(&id)?)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// Change the quantity of a cart line, checked against live stock.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCartItemRequest>,
) -> Result<Json<CartLine>> {
    let cart_item_id = parse_cart_item_id(&id)?;
    validate_quantity(body.quantity)?;

    let line = state
        .carts()
        .update_quantity(claims.sub, cart_item_id, body.quantity)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => not_found(),
            other => other.into(),
        })?;

    tracing::info!(
        user_id = %claims.sub,
        %cart_item_id,
        quantity = line.quantity,
        "Cart item updated"
    );
    Ok(Json(line))
}

/// Remove a line from the caller's cart.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let cart_item_id = parse_cart_item_id(&id)?;

    if !state.carts().remove_item(claims.sub, cart_item_id).await? {
        return Err(not_found());
    }

    tracing::info!(user_id = %claims.sub, %cart_item_id, "Removed from cart");
    Ok(StatusCode::NO_CONTENT)
}
