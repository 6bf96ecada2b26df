//! Cart snapshots and the order drafts computed from them.
//!
//! A [`CartLine`] is a read-only view of one cart item joined with its
//! product. [`OrderDraft::from_cart`] turns a snapshot into priced order
//! lines; both the Postgres and in-memory settlement paths call it inside
//! their transaction so the captured unit prices are the ones in effect at
//! settlement time.

use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId};
use super::price::{CurrencyCode, Price, PriceError};

/// One item in a user's cart, joined with the live product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    /// Live product price.
    pub unit_price: Price,
    pub quantity: i32,
    /// Units of the product currently in stock.
    pub stock: i32,
}

/// A priced line of a not-yet-persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Unit price captured at settlement, decoupled from later price edits.
    pub unit_price: Price,
}

/// Errors building an order from a cart snapshot.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderDraftError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("cart item for product {0} has non-positive quantity")]
    InvalidQuantity(ProductId),
    #[error("cart mixes currencies {0:?} and {1:?}")]
    MixedCurrency(CurrencyCode, CurrencyCode),
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// Order lines plus total, ready to be written in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub lines: Vec<OrderLine>,
    pub total: Price,
}

impl OrderDraft {
    /// Price a cart snapshot.
    ///
    /// Stock is not checked here: the conditional decrement at write time is
    /// the authority, since the snapshot's `stock` may already be stale.
    ///
    /// # Errors
    ///
    /// Returns `OrderDraftError::EmptyCart` for an empty snapshot,
    /// `InvalidQuantity` for non-positive quantities and `MixedCurrency` if
    /// lines disagree on currency.
    pub fn from_cart(lines: &[CartLine]) -> Result<Self, OrderDraftError> {
        let first = lines.first().ok_or(OrderDraftError::EmptyCart)?;
        let currency = first.unit_price.currency_code;

        let mut total = Price::zero(currency);
        let mut order_lines = Vec::with_capacity(lines.len());

        for line in lines {
            if line.unit_price.currency_code != currency {
                return Err(OrderDraftError::MixedCurrency(
                    currency,
                    line.unit_price.currency_code,
                ));
            }

            let quantity = u32::try_from(line.quantity)
                .ok()
                .filter(|q| *q > 0)
                .ok_or(OrderDraftError::InvalidQuantity(line.product_id))?;

            let subtotal = line.unit_price.times(quantity)?;
            total.amount = total
                .amount
                .checked_add(subtotal.amount)
                .ok_or(PriceError::Overflow)?;

            order_lines.push(OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        Ok(Self {
            lines: order_lines,
            total,
        })
    }
}
