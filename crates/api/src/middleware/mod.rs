//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. Request ID (assign or propagate `x-request-id`)
//! 3. `TraceLayer` (request span carrying the request ID)
//! 4. Rate limiting on `/auth/*` (governor)
//!
//! Authentication is not a layer: handlers opt in with the
//! [`RequireAuth`] extractor.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::RequireAuth;
pub use rate_limit::auth_rate_limiter;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
