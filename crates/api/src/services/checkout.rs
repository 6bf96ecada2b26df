//! Hosted checkout initiation.

use std::collections::BTreeMap;

use thiserror::Error;
use url::Url;

use cartline_core::{PriceError, UserId};

use crate::db::{CartRepository, RepositoryError};
use crate::payments::{
    CheckoutLineItem, CheckoutSessionRequest, PaymentError, PaymentProvider, USER_ID_METADATA_KEY,
};

/// Message shown when the provider redirects back after payment.
pub const CHECKOUT_SUCCESS_MESSAGE: &str = "Checkout successful!";

/// Message shown when the buyer abandons the hosted page.
pub const CHECKOUT_CANCELED_MESSAGE: &str = "Checkout canceled.";

/// Errors that can occur while starting a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    /// The return query had neither `success` nor `canceled` set.
    #[error("invalid checkout result")]
    InvalidResult,

    #[error("price error: {0}")]
    Price(#[from] PriceError),

    #[error("payment provider error: {0}")]
    Provider(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Where to send the buyer to pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRedirect {
    pub url: String,
}

/// Builds provider checkout sessions from a user's cart.
///
/// Read-only: nothing local changes until the payment webhook arrives.
pub struct CheckoutService<'a> {
    carts: &'a dyn CartRepository,
    provider: &'a dyn PaymentProvider,
    frontend_base_url: &'a Url,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        carts: &'a dyn CartRepository,
        provider: &'a dyn PaymentProvider,
        frontend_base_url: &'a Url,
    ) -> Self {
        Self {
            carts,
            provider,
            frontend_base_url,
        }
    }

    /// Open a hosted checkout session for the user's current cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the cart is empty and
    /// `CheckoutError::Provider` if the provider call fails.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_checkout_session(
        &self,
        user_id: UserId,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        let lines = self.carts.lines_for_user(user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let line_items = lines
            .iter()
            .map(|line| {
                Ok(CheckoutLineItem {
                    name: line.product_name.clone(),
                    currency: line.unit_price.currency_code,
                    unit_amount: line.unit_price.minor_units()?,
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, PriceError>>()?;

        let request = CheckoutSessionRequest {
            line_items,
            success_url: self.return_url("success"),
            cancel_url: self.return_url("canceled"),
            client_reference_id: user_id.to_string(),
            metadata: BTreeMap::from([(USER_ID_METADATA_KEY.to_owned(), user_id.to_string())]),
        };

        let session = self.provider.create_checkout_session(&request).await?;
        tracing::info!(session_id = %session.id, "Checkout session opened");

        Ok(CheckoutRedirect { url: session.url })
    }

    fn return_url(&self, flag: &str) -> String {
        format!(
            "{}/checkout?{flag}=true",
            self.frontend_base_url.as_str().trim_end_matches('/')
        )
    }
}

/// Message for the page the provider redirects back to.
///
/// # Errors
///
/// Returns `CheckoutError::InvalidResult` unless exactly one of the flags
/// is `"true"`.
pub fn checkout_result(
    success: Option<&str>,
    canceled: Option<&str>,
) -> Result<&'static str, CheckoutError> {
    match (success == Some("true"), canceled == Some("true")) {
        (true, false) => Ok(CHECKOUT_SUCCESS_MESSAGE),
        (false, true) => Ok(CHECKOUT_CANCELED_MESSAGE),
        _ => Err(CheckoutError::InvalidResult),
    }
}
