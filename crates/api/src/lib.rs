//! Cartline API library.
//!
//! Session management (JWT access tokens plus a rotating, hashed refresh
//! token), carts, hosted checkout and webhook-driven payment settlement.
//! The binary in `main.rs` wires these together; the library form lets the
//! integration tests drive the same router against in-memory repositories.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
