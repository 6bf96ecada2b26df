//! Payment settlement.
//!
//! Turns a verified, paid checkout event into an order. Runs detached from
//! the webhook request: the provider has already been acknowledged, so
//! failures are reported to logs and Sentry only.

use thiserror::Error;

use cartline_core::{ProductId, UserId};

use crate::db::{OrderRepository, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::{SettlementOutcome, SettlementRequest};
use crate::payments::{USER_ID_METADATA_KEY, WebhookEvent};
use crate::state::AppState;

/// Errors that can occur while settling a payment.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Checkout event object is not a checkout session.
    #[error("malformed checkout event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("checkout session has no user id metadata")]
    MissingUserId,

    #[error("checkout session has invalid user id metadata: {0}")]
    InvalidUserId(String),

    /// Stock ran out between checkout and payment.
    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for SettlementError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::InsufficientStock(product_id) => Self::InsufficientStock(product_id),
            other => Self::Repository(other),
        }
    }
}

/// Reconciles payment events with carts and stock.
pub struct SettlementService<'a> {
    orders: &'a dyn OrderRepository,
}

impl<'a> SettlementService<'a> {
    #[must_use]
    pub const fn new(orders: &'a dyn OrderRepository) -> Self {
        Self { orders }
    }

    /// Settle a verified webhook event.
    ///
    /// Returns `Ok(None)` for events that do not complete a payment: other
    /// event types, and checkout sessions that are not paid yet.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::MissingUserId`/`InvalidUserId` if the
    /// session does not identify a user, `InsufficientStock` if stock ran
    /// out (nothing is written) and `Repository` for storage failures.
    #[tracing::instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn settle(
        &self,
        event: &WebhookEvent,
    ) -> Result<Option<SettlementOutcome>, SettlementError> {
        let Some(session) = event.checkout_session()? else {
            tracing::debug!("Ignoring non-checkout event");
            return Ok(None);
        };

        if !session.is_paid() {
            tracing::info!(
                session_id = %session.id,
                payment_status = session.payment_status.as_deref().unwrap_or("unknown"),
                "Checkout session not paid yet"
            );
            return Ok(None);
        }

        let raw_user_id = session
            .metadata
            .get(USER_ID_METADATA_KEY)
            .ok_or(SettlementError::MissingUserId)?;
        let user_id: UserId = raw_user_id
            .parse()
            .map_err(|_| SettlementError::InvalidUserId(raw_user_id.clone()))?;

        let request = SettlementRequest {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            checkout_session_id: session.id,
            user_id,
        };

        let outcome = match self.orders.settle(&request).await {
            // A concurrent settlement of the same session won the unique index
            Err(RepositoryError::Conflict(_)) => SettlementOutcome::AlreadyProcessed,
            other => other?,
        };

        Ok(Some(outcome))
    }
}

/// Settle `event` on a background task.
///
/// The returned handle is only useful to tests; the webhook handler
/// drops it.
pub fn spawn_settlement(state: AppState, event: WebhookEvent) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let service = SettlementService::new(state.orders());

        match service.settle(&event).await {
            Ok(Some(SettlementOutcome::Settled(order))) => {
                let order_id = order.id.to_string();
                add_breadcrumb("settlement", "Order created", Some(&[("order_id", order_id.as_str())]));
                tracing::info!(
                    event_id = %event.id,
                    order_id = %order.id,
                    user_id = %order.user_id,
                    total = %order.total.amount,
                    "Payment settled"
                );
            }
            Ok(Some(SettlementOutcome::AlreadyProcessed)) => {
                tracing::info!(event_id = %event.id, "Duplicate payment event ignored");
            }
            Ok(Some(SettlementOutcome::EmptyCart)) => {
                tracing::warn!(event_id = %event.id, "Paid checkout found an empty cart");
            }
            Ok(None) => {}
            Err(e) => {
                sentry::capture_error(&e);
                tracing::error!(event_id = %event.id, error = %e, "Payment settlement failed");
            }
        }
    })
}
