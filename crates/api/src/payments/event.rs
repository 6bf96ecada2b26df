//! Webhook event envelopes.

use std::collections::HashMap;

use serde::Deserialize;

/// A checkout session finished and may be paid.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// A delayed payment method for a checkout session succeeded.
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
    "checkout.session.async_payment_succeeded";

/// Payment status of a session whose funds are captured.
const PAID: &str = "paid";

/// A verified webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The fields of a checkout session object this service reads.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some(PAID)
    }
}

impl WebhookEvent {
    /// Whether this event type can complete a payment.
    #[must_use]
    pub fn is_checkout_event(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            CHECKOUT_SESSION_COMPLETED | CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED
        )
    }

    /// The checkout session carried by a checkout event.
    ///
    /// Returns `Ok(None)` for unrelated event types.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error if a checkout event's object is
    /// not a checkout session.
    pub fn checkout_session(&self) -> Result<Option<CheckoutSessionObject>, serde_json::Error> {
        if !self.is_checkout_event() {
            return Ok(None);
        }
        serde_json::from_value(self.data.object.clone()).map(Some)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(event_type: &str, object: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object },
        }))
        .unwrap()
    }

    #[test]
    fn test_completed_session_parsed() {
        let event = event(
            CHECKOUT_SESSION_COMPLETED,
            serde_json::json!({
                "id": "cs_test_1",
                "object": "checkout.session",
                "payment_status": "paid",
                "metadata": { "user_id": "abc" },
            }),
        );

        let session = event.checkout_session().unwrap().unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert!(session.is_paid());
        assert_eq!(session.metadata.get("user_id").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_unpaid_session() {
        let event = event(
            CHECKOUT_SESSION_COMPLETED,
            serde_json::json!({ "id": "cs_1", "payment_status": "unpaid" }),
        );
        assert!(!event.checkout_session().unwrap().unwrap().is_paid());
    }

    #[test]
    fn test_other_events_ignored() {
        let event = event("invoice.paid", serde_json::json!({ "id": "in_1" }));
        assert!(!event.is_checkout_event());
        assert_eq!(event.checkout_session().unwrap(), None);
    }

    #[test]
    fn test_malformed_checkout_object() {
        let event = event(CHECKOUT_SESSION_COMPLETED, serde_json::json!({ "nope": 1 }));
        assert!(event.checkout_session().is_err());
    }
}
