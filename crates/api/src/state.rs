//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::{
    CartRepository, MemoryStore, OrderRepository, PgCartRepository, PgOrderRepository,
    PgRefreshTokenRepository, PgUserRepository, RefreshTokenRepository, UserRepository,
};
use crate::payments::PaymentProvider;
use crate::services::tokens::TokenIssuer;

/// The repository set handlers run against.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

impl Repositories {
    /// Postgres-backed repositories sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenRepository::new(pool.clone())),
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
        }
    }

    /// Repositories over one shared in-memory store.
    #[must_use]
    pub fn memory(store: &MemoryStore) -> Self {
        Self {
            users: Arc::new(store.clone()),
            refresh_tokens: Arc::new(store.clone()),
            carts: Arc::new(store.clone()),
            orders: Arc::new(store.clone()),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like repositories, the token issuer and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    repositories: Repositories,
    payments: Arc<dyn PaymentProvider>,
    tokens: TokenIssuer,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `pool` is used for readiness checks only; pass `None` when the
    /// repositories are not database-backed.
    #[must_use]
    pub fn new(
        config: ApiConfig,
        repositories: Repositories,
        payments: Arc<dyn PaymentProvider>,
        pool: Option<PgPool>,
    ) -> Self {
        let tokens = TokenIssuer::new(&config.auth);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                repositories,
                payments,
                tokens,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserRepository {
        self.inner.repositories.users.as_ref()
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> &dyn RefreshTokenRepository {
        self.inner.repositories.refresh_tokens.as_ref()
    }

    #[must_use]
    pub fn carts(&self) -> &dyn CartRepository {
        self.inner.repositories.carts.as_ref()
    }

    #[must_use]
    pub fn orders(&self) -> &dyn OrderRepository {
        self.inner.repositories.orders.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProvider {
        self.inner.payments.as_ref()
    }

    /// Database pool, if the repositories are Postgres-backed.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
