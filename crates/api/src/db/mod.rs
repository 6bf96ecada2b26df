//! Persistence for the API.
//!
//! # Database: `cartline`
//!
//! ## Tables
//!
//! - `app_user` - Accounts with argon2 password hashes
//! - `refresh_token` - One hashed refresh token per user
//! - `product` - Catalog with stock counts (`quantity >= 0`)
//! - `cart_item` - One row per (user, product)
//! - `customer_order` / `order_item` - Settled orders
//! - `payment_event` - Processed provider event IDs
//!
//! Every aggregate is reached through a trait so handlers can run against
//! either the Postgres repositories in this module or the in-memory
//! [`memory::MemoryStore`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p cartline-cli -- migrate
//! ```

pub mod carts;
pub mod memory;
pub mod orders;
pub mod products;
pub mod refresh_tokens;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use cartline_core::{CartItemId, CartLine, Email, OrderId, OrderStatus, ProductId, UserId};

use crate::models::{
    NewUser, Order, RefreshTokenRecord, SettlementOutcome, SettlementRequest, User,
    UserCredentials,
};

pub use carts::PgCartRepository;
pub use memory::MemoryStore;
pub use orders::PgOrderRepository;
pub use products::PgProductRepository;
pub use refresh_tokens::PgRefreshTokenRepository;
pub use users::PgUserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A product does not have enough units in stock.
    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Account storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Fails with `Conflict` if the email is taken.
    async fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError>;

    /// Look up a user and their password hash by email.
    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
}

/// Refresh-token hash storage, at most one row per user.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Insert the first token hash for a user. `Conflict` if one exists.
    async fn insert(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<RefreshTokenRecord, RepositoryError>;

    async fn find_by_user_id(
        &self,
        user_id: UserId,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError>;

    /// Overwrite the stored hash in one statement. `NotFound` if absent.
    async fn replace(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<RefreshTokenRecord, RepositoryError>;

    /// Delete the user's token. Returns whether a row existed.
    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError>;
}

/// Cart storage.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The user's cart joined with live product rows.
    async fn lines_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Add a product to the cart.
    ///
    /// `NotFound` if the product does not exist, `InsufficientStock` if the
    /// quantity exceeds stock and `Conflict` if it is already in the cart.
    async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError>;

    /// One line of the user's cart. Items owned by other users are `None`.
    async fn get_item(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Change the quantity of a cart line.
    ///
    /// `NotFound` if the user has no such line, `InsufficientStock` if the
    /// new quantity exceeds stock.
    async fn update_quantity(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError>;

    /// Remove a line from the cart. Returns whether it existed.
    async fn remove_item(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
    ) -> Result<bool, RepositoryError>;
}

/// Order storage and the settlement transaction.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn list_for_user(
        &self,
        user_id: UserId,
        status: OrderStatus,
    ) -> Result<Vec<Order>, RepositoryError>;

    async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Turn the user's cart into an order, atomically.
    ///
    /// Records the event ID, re-reads the cart, decrements stock
    /// conditionally, writes the order with captured prices and clears the
    /// settled cart rows. Either all of that commits or none of it does.
    /// Replays of the same event or checkout session return
    /// `AlreadyProcessed`. Fails with `InsufficientStock` if any decrement
    /// would go below zero.
    async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementOutcome, RepositoryError>;
}
