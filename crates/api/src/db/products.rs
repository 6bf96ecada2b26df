//! Postgres product repository, used for seeding the catalog.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use cartline_core::{CurrencyCode, Price, ProductId};

use super::RepositoryError;
use crate::models::{NewProduct, Product};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    quantity: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: Price::new(row.price, CurrencyCode::USD),
            quantity: row.quantity,
        }
    }
}

/// Repository for `product` rows.
#[derive(Debug, Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails (including
    /// a negative quantity rejected by the check constraint).
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(
            r"
            INSERT INTO product (id, name, description, price, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, price, quantity
            ",
        )
        .bind(ProductId::generate())
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price.amount)
        .bind(product.quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// List every product, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT id, name, description, price, quantity FROM product ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
