//! Business logic services.
//!
//! Services borrow their repositories from [`crate::state::AppState`] and
//! are constructed per request.

pub mod auth;
pub mod checkout;
pub mod refresh_tokens;
pub mod settlement;
pub mod tokens;
