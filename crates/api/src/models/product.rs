//! Catalog products.

use serde::Serialize;

use cartline_core::{Price, ProductId};

/// A product row. `quantity` is the stock count and never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub quantity: i32,
}

/// Input for seeding a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub quantity: i32,
}
