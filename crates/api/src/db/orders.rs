//! Postgres order repository and the settlement transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use cartline_core::{
    CartLine, CurrencyCode, OrderDraft, OrderId, OrderItemId, OrderStatus, Price, ProductId,
    UserId,
};

use super::carts::CartLineRow;
use super::{OrderRepository, RepositoryError, conflict_on_unique};
use crate::models::{Order, OrderItem, SettlementOutcome, SettlementRequest};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    checkout_session_id: String,
    total: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            unit_price: Price::new(row.unit_price, CurrencyCode::USD),
        }
    }
}

/// Repository for `customer_order`, `order_item` and `payment_event` rows.
#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let items: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_item
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| Order {
                items: by_order.remove(&row.id).unwrap_or_default(),
                id: OrderId::new(row.id),
                user_id: UserId::new(row.user_id),
                checkout_session_id: row.checkout_session_id,
                total: Price::new(row.total, CurrencyCode::USD),
                status: row.status,
                created_at: row.created_at,
            })
            .collect())
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn list_for_user(
        &self,
        user_id: UserId,
        status: OrderStatus,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r"
            SELECT id, user_id, checkout_session_id, total, status, created_at
            FROM customer_order
            WHERE user_id = $1 AND status = $2
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(rows).await
    }

    async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r"
            SELECT id, user_id, checkout_session_id, total, status, created_at
            FROM customer_order
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Blocks on a concurrent delivery of the same event until it commits
        let recorded = sqlx::query(
            r"
            INSERT INTO payment_event (event_id, event_type, checkout_session_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(&request.event_id)
        .bind(&request.event_type)
        .bind(&request.checkout_session_id)
        .execute(&mut *tx)
        .await?;

        if recorded.rows_affected() == 0 {
            return Ok(SettlementOutcome::AlreadyProcessed);
        }

        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM customer_order WHERE checkout_session_id = $1")
                .bind(&request.checkout_session_id)
                .fetch_optional(&mut *tx)
                .await?;

        if existing.is_some() {
            tx.commit().await?;
            return Ok(SettlementOutcome::AlreadyProcessed);
        }

        // Lock in product order so concurrent settlements never deadlock
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT ci.id AS cart_item_id, ci.product_id, p.name AS product_name,
                   p.price AS unit_price, ci.quantity, p.quantity AS stock
            FROM cart_item ci
            JOIN product p ON p.id = ci.product_id
            WHERE ci.user_id = $1
            ORDER BY ci.product_id
            FOR UPDATE OF ci
            ",
        )
        .bind(request.user_id)
        .fetch_all(&mut *tx)
        .await?;

        let lines: Vec<CartLine> = rows.into_iter().map(Into::into).collect();
        if lines.is_empty() {
            tx.commit().await?;
            return Ok(SettlementOutcome::EmptyCart);
        }

        let draft = OrderDraft::from_cart(&lines).map_err(|e| {
            RepositoryError::DataCorruption(format!("cart cannot be settled: {e}"))
        })?;

        decrement_stock(&mut tx, &draft).await?;
        let order = insert_order(&mut tx, request, &draft).await?;

        let settled_items: Vec<Uuid> =
            lines.iter().map(|line| line.cart_item_id.as_uuid()).collect();
        sqlx::query("DELETE FROM cart_item WHERE user_id = $1 AND id = ANY($2)")
            .bind(request.user_id)
            .bind(&settled_items)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(SettlementOutcome::Settled(order))
    }
}

/// Conditionally decrement stock for every line.
///
/// A line whose decrement matches no row means stock ran out; returning the
/// error drops `tx` and rolls the whole settlement back.
async fn decrement_stock(
    tx: &mut Transaction<'_, Postgres>,
    draft: &OrderDraft,
) -> Result<(), RepositoryError> {
    for line in &draft.lines {
        let updated = sqlx::query(
            r"
            UPDATE product
            SET quantity = quantity - $1, updated_at = NOW()
            WHERE id = $2 AND quantity >= $1
            ",
        )
        .bind(line.quantity)
        .bind(line.product_id)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::InsufficientStock(line.product_id));
        }
    }
    Ok(())
}

async fn insert_order(
    tx: &mut Transaction<'_, Postgres>,
    request: &SettlementRequest,
    draft: &OrderDraft,
) -> Result<Order, RepositoryError> {
    let order_id = OrderId::generate();
    let status = OrderStatus::Delivering;

    let (created_at,): (DateTime<Utc>,) = sqlx::query_as(
        r"
        INSERT INTO customer_order (id, user_id, checkout_session_id, total, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING created_at
        ",
    )
    .bind(order_id)
    .bind(request.user_id)
    .bind(&request.checkout_session_id)
    .bind(draft.total.amount)
    .bind(status)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| conflict_on_unique(e, "checkout session already settled"))?;

    let mut items = Vec::with_capacity(draft.lines.len());
    for line in &draft.lines {
        let item = OrderItem {
            id: OrderItemId::generate(),
            order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        };

        sqlx::query(
            r"
            INSERT INTO order_item (id, order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(item.id)
        .bind(item.order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price.amount)
        .execute(&mut **tx)
        .await?;

        items.push(item);
    }

    Ok(Order {
        id: order_id,
        user_id: request.user_id,
        checkout_session_id: request.checkout_session_id.clone(),
        total: draft.total,
        status,
        items,
        created_at,
    })
}
