//! Orders and the settlement request/outcome pair.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartline_core::{OrderId, OrderItemId, OrderStatus, Price, ProductId, UserId};

/// A persisted order. Only settlement creates these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Provider checkout session this order settled; unique across orders.
    pub checkout_session_id: String,
    pub total: Price,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// One line of an order with its captured unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Price,
}

/// A verified, settle-worthy payment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    /// Provider event ID, the idempotency key.
    pub event_id: String,
    pub event_type: String,
    pub checkout_session_id: String,
    pub user_id: UserId,
}

/// What a settlement attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// A new order was written, stock decremented and the cart cleared.
    Settled(Order),
    /// The event or checkout session was already settled; nothing changed.
    AlreadyProcessed,
    /// The user's cart was empty; the event is recorded and no order is made.
    EmptyCart,
}
