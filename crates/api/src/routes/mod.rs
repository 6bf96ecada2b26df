//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Auth
//! POST /auth/sign-up           - Register and start a session
//! POST /auth/sign-in           - Start a session
//! POST /auth/refresh           - New access token from the refresh cookie
//! POST /auth/sign-out          - Revoke the refresh token (bearer)
//! GET  /auth/me                - Current identity (bearer)
//!
//! # Cart (bearer)
//! GET  /cart-items             - Current cart
//! POST /cart-items             - Add a product
//! GET  /cart-items/{id}        - One cart line
//! PATCH /cart-items/{id}       - Change quantity
//! DELETE /cart-items/{id}      - Remove a line
//!
//! # Checkout
//! POST /checkout               - Open a hosted checkout session (bearer)
//! GET  /checkout               - Return page message
//! POST /webhooks/stripe        - Payment provider webhook
//!
//! # Orders (bearer)
//! GET  /orders                 - Orders being delivered
//! GET  /orders/{id}            - One order
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod webhooks;

use axum::{
    Router,
    extract::FromRequest,
    routing::{get, post},
};

use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections use the API error format.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Create the auth routes router (mounted under `/auth`).
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/sign-in", post(auth::sign_in))
        .route("/refresh", post(auth::refresh))
        .route("/sign-out", post(auth::sign_out))
        .route("/me", get(auth::me))
}

/// Create every route outside `/auth`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/cart-items", get(cart::list).post(cart::add))
        .route(
            "/cart-items/{id}",
            get(cart::show).patch(cart::update).delete(cart::remove),
        )
        .route("/checkout", get(checkout::result).post(checkout::create))
        .route("/webhooks/stripe", post(webhooks::stripe))
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
}

/// The full route table, without rate limiting.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .merge(api_routes())
}
