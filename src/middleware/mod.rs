//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers. They can:
//! - Authenticate requests
//! - Short-circuit requests (reject unauthorized)

/// Session and API key authentication middleware
pub mod auth;
