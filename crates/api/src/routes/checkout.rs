//! Checkout route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use super::auth::MessageResponse;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::checkout::{CheckoutService, checkout_result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub stripe_session_url: String,
}

/// Flags the provider appends to the return URL.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutResultQuery {
    pub success: Option<String>,
    pub canceled: Option<String>,
}

/// Open a hosted checkout session for the caller's cart.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<CheckoutResponse>> {
    let redirect = CheckoutService::new(
        state.carts(),
        state.payments(),
        &state.config().frontend_base_url,
    )
    .create_checkout_session(claims.sub)
    .await?;

    Ok(Json(CheckoutResponse {
        stripe_session_url: redirect.url,
    }))
}

/// Message for the page the buyer returns to.
pub async fn result(Query(query): Query<CheckoutResultQuery>) -> Result<Json<MessageResponse>> {
    let message = checkout_result(query.success.as_deref(), query.canceled.as_deref())?;
    Ok(Json(MessageResponse { message }))
}
