//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Performs business logic (database queries, validation)
//! 3. Returns HTTP response (JSON, status code)

/// Dashboard account plan endpoint
pub mod account;
/// Metered execution gate
pub mod execute;
/// Liveness and store connectivity
pub mod health;
/// API key management endpoints
pub mod keys;
/// Inbound billing provider webhooks
pub mod webhooks;
