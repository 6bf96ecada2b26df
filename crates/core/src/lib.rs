//! Cartline Core - Shared domain types.
//!
//! This crate provides the types shared by every Cartline component:
//! - `api` - HTTP backend (auth sessions, checkout, settlement)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure computations - no I/O, no
//! database access, no HTTP clients. Order totals are computed here so the
//! Postgres and in-memory settlement paths price a cart identically.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, prices, statuses, cart lines and order drafts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
