//! Domain models owned by the API crate.
//!
//! Value types shared with other crates (IDs, `Email`, `Price`, cart
//! snapshots) live in `cartline-core`; the records here are the shapes the
//! repositories read and write.

pub mod order;
pub mod product;
pub mod refresh_token;
pub mod session;
pub mod user;

pub use order::{Order, OrderItem, SettlementOutcome, SettlementRequest};
pub use product::{NewProduct, Product};
pub use refresh_token::RefreshTokenRecord;
pub use session::{AuthClaims, AuthPayload, SessionState};
pub use user::{NewUser, User, UserCredentials};
