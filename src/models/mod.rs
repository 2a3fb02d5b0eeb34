//! Data models representing database entities and wire payloads.

/// Account entity and entitlement plan table
pub mod account;
/// API key credential model
pub mod api_key;
/// Billing provider webhook payloads
pub mod billing_event;
/// Usage ledger entries
pub mod usage;
