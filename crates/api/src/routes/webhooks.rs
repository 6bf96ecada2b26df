//! Payment provider webhook.
//!
//! The signature is checked against the raw body before anything is parsed.
//! Accepted checkout events are settled in a background task so the
//! provider gets its acknowledgement immediately.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::payments::{WebhookEvent, signature::SIGNATURE_HEADER, verify_signature};
use crate::services::settlement::spawn_settlement;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Receive a Stripe webhook.
#[tracing::instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    verify_signature(
        signature,
        &body,
        &state.config().stripe.webhook_signing_secret,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook signature");
        AppError::Unauthorized
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {e}")))?;

    if event.is_checkout_event() {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Settling checkout event");
        spawn_settlement(state, event);
    } else {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
    }

    Ok(Json(WebhookAck { received: true }))
}
