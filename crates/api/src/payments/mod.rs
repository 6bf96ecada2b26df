//! Payment provider integration.
//!
//! The provider hosts the checkout page and reports completed payments
//! through signed webhooks. [`PaymentProvider`] is the outbound seam;
//! [`signature`] and [`event`] handle the inbound side.

pub mod event;
pub mod signature;
pub mod stripe;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use cartline_core::CurrencyCode;

pub use event::{CheckoutSessionObject, WebhookEvent};
pub use signature::{SignatureError, verify_signature};
pub use stripe::StripeClient;

/// Metadata key carrying the buyer's user ID through the provider.
pub const USER_ID_METADATA_KEY: &str = "user_id";

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// One product line on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub currency: CurrencyCode,
    /// Unit price in minor units (cents).
    pub unit_amount: i64,
    pub quantity: i32,
}

/// Everything needed to open a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub metadata: BTreeMap<String, String>,
}

/// A created hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Outbound calls to the payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}
