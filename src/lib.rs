//! Entitlement service library.
//!
//! Owns account entitlement and API key lifecycle for a metered execution
//! product: the billing webhook reconciler, the key lifecycle manager, and
//! the quota gate. Exposed as a library so the decision logic is reachable
//! from integration tests; the binary in `main.rs` wires it to HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::{Config, PriceTable};
pub use error::AppError;
pub use state::AppState;
