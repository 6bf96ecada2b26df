//! Postgres cart repository.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use cartline_core::{CartItemId, CartLine, CurrencyCode, Price, ProductId, UserId};

use super::{CartRepository, RepositoryError, conflict_on_unique};

#[derive(sqlx::FromRow)]
pub(super) struct CartLineRow {
    pub cart_item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            cart_item_id: CartItemId::new(row.cart_item_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            unit_price: Price::new(row.unit_price, CurrencyCode::USD),
            quantity: row.quantity,
            stock: row.stock,
        }
    }
}

/// Repository for `cart_item` rows.
#[derive(Debug, Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn lines_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            r"
            SELECT ci.id AS cart_item_id, ci.product_id, p.name AS product_name,
                   p.price AS unit_price, ci.quantity, p.quantity AS stock
            FROM cart_item ci
            JOIN product p ON p.id = ci.product_id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Share-lock the product so the stock check holds until the insert
        let product: Option<(String, Decimal, i32)> = sqlx::query_as(
            "SELECT name, price, quantity FROM product WHERE id = $1 FOR SHARE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (name, price, stock) = product.ok_or(RepositoryError::NotFound)?;
        if quantity > stock {
            return Err(RepositoryError::InsufficientStock(product_id));
        }

        let cart_item_id = CartItemId::generate();
        sqlx::query(
            r"
            INSERT INTO cart_item (id, user_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(cart_item_id)
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Product is already in cart"))?;

        tx.commit().await?;

        Ok(CartLine {
            cart_item_id,
            product_id,
            product_name: name,
            unit_price: Price::new(price, CurrencyCode::USD),
            quantity,
            stock,
        })
    }

    async fn get_item(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row: Option<CartLineRow> = sqlx::query_as(
            r"
            SELECT ci.id AS cart_item_id, ci.product_id, p.name AS product_name,
                   p.price AS unit_price, ci.quantity, p.quantity AS stock
            FROM cart_item ci
            JOIN product p ON p.id = ci.product_id
            WHERE ci.id = $1 AND ci.user_id = $2
            ",
        )
        .bind(cart_item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update_quantity(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<CartLineRow> = sqlx::query_as(
            r"
            SELECT ci.id AS cart_item_id, ci.product_id, p.name AS product_name,
                   p.price AS unit_price, ci.quantity, p.quantity AS stock
            FROM cart_item ci
            JOIN product p ON p.id = ci.product_id
            WHERE ci.id = $1 AND ci.user_id = $2
            FOR UPDATE OF ci
            FOR SHARE OF p
            ",
        )
        .bind(cart_item_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut line: CartLine = row.ok_or(RepositoryError::NotFound)?.into();
        if quantity > line.stock {
            return Err(RepositoryError::InsufficientStock(line.product_id));
        }

        sqlx::query("UPDATE cart_item SET quantity = $1 WHERE id = $2")
            .bind(quantity)
            .bind(cart_item_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        line.quantity = quantity;
        Ok(line)
    }

    async fn remove_item(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_item WHERE id = $1 AND user_id = $2")
            .bind(cart_item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
