//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers. Each
//! durable entity has exactly one writing service: the reconciler owns
//! account entitlement state, the key service owns credentials, and the
//! quota service owns the usage ledger.

pub mod accounts;
pub mod keys;
pub mod quota;
pub mod reconciler;
