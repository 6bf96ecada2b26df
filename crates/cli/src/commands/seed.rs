//! Seed the product catalog from a YAML file.
//!
//! ```yaml
//! - name: Espresso Beans
//!   description: 1kg bag
//!   price: "24.50"
//!   quantity: 40
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use cartline_api::db::{PgProductRepository, create_pool};
use cartline_api::models::NewProduct;
use cartline_core::{CurrencyCode, Price};

/// One product entry in the seed file. Prices are USD.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
}

impl ProductSeed {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name cannot be empty".to_owned());
        }
        if self.price.is_sign_negative() {
            return Err(format!("{}: price cannot be negative", self.name));
        }
        if self.price.scale() > 2 {
            return Err(format!("{}: price has sub-cent precision", self.name));
        }
        if self.quantity < 0 {
            return Err(format!("{}: quantity cannot be negative", self.name));
        }
        Ok(())
    }

    fn into_new_product(self) -> NewProduct {
        NewProduct {
            name: self.name.trim().to_owned(),
            description: self.description,
            price: Price::new(self.price, CurrencyCode::USD),
            quantity: self.quantity,
        }
    }
}

/// Parse and validate a seed file's contents.
///
/// # Errors
///
/// Returns every validation failure, or the YAML parse error.
pub fn parse_products(content: &str) -> Result<Vec<ProductSeed>, Vec<String>> {
    let seeds: Vec<ProductSeed> = serde_yaml::from_str(content).map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = seeds.iter().filter_map(|s| s.validate().err()).collect();
    if errors.is_empty() {
        Ok(seeds)
    } else {
        Err(errors)
    }
}

/// Insert every product in the file.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is missing, the file cannot be read or
/// validated, or an insert fails.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;

    let seeds = match parse_products(&content) {
        Ok(seeds) => seeds,
        Err(errors) => {
            error!("Seed file validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(format!("{} validation errors found", errors.len()).into());
        }
    };

    let pool = create_pool(&database_url).await?;
    let repo = PgProductRepository::new(pool);

    for seed in seeds {
        let product = repo.create(&seed.into_new_product()).await?;
        info!(product_id = %product.id, name = %product.name, stock = product.quantity, "Seeded product");
    }

    info!("Seeding complete!");
    Ok(())
}
