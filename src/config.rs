//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment
//! variables into a type-safe struct, and builds the static price→plan
//! table from the configured billing price ids.

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::account::Plan;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `BILLING_WEBHOOK_SECRET` (required): HMAC key for webhook signatures
/// - `ENGINE_URL` (required): execution engine endpoint for admitted runs
/// - `ENGINE_TIMEOUT_SECS` (optional): engine round-trip bound, defaults to 30
/// - `BILLING_PRICE_PRO` / `BILLING_PRICE_PRO_PLUS` /
///   `BILLING_PRICE_ENTERPRISE` (optional): provider price ids mapped to
///   paid plans; a price id the provider sends that is not configured here
///   is never assigned a plan
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub billing_webhook_secret: String,

    pub engine_url: String,

    #[serde(default = "default_engine_timeout")]
    pub engine_timeout_secs: u64,

    pub billing_price_pro: Option<String>,
    pub billing_price_pro_plus: Option<String>,
    pub billing_price_enterprise: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Default connection pool size.
fn default_max_connections() -> u32 {
    5
}

/// Default bound on an engine round-trip.
fn default_engine_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables, deserializes them into a Config
    /// struct, and validates the engine URL.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variable values cannot be parsed into expected types
    /// - `ENGINE_URL` is not a valid http(s) URL
    pub fn from_env() -> anyhow::Result<Self> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;

        let engine_url = url::Url::parse(&config.engine_url)?;
        if !matches!(engine_url.scheme(), "http" | "https") {
            anyhow::bail!("ENGINE_URL must use http or https");
        }

        Ok(config)
    }
}

/// Static mapping from billing provider price ids to plans.
///
/// This is configuration, not protocol: the reconciler consults it when a
/// subscription event arrives, and an unmapped price is logged and ignored
/// rather than guessed at.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    entries: HashMap<String, Plan>,
}

impl PriceTable {
    /// Build the table from the configured price ids. Tiers without a
    /// configured price simply have no entry.
    pub fn from_config(config: &Config) -> Self {
        let mut entries = HashMap::new();
        if let Some(price) = &config.billing_price_pro {
            entries.insert(price.clone(), Plan::Pro);
        }
        if let Some(price) = &config.billing_price_pro_plus {
            entries.insert(price.clone(), Plan::ProPlus);
        }
        if let Some(price) = &config.billing_price_enterprise {
            entries.insert(price.clone(), Plan::Enterprise);
        }
        Self { entries }
    }

    /// Resolve a provider price id to a plan. `None` means the price is
    /// unknown and the caller must not apply any plan change.
    pub fn resolve(&self, price_id: &str) -> Option<Plan> {
        self.entries.get(price_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_prices() -> Config {
        Config {
            database_url: "postgres://localhost/entitlements".to_string(),
            database_max_connections: 5,
            server_port: 3000,
            billing_webhook_secret: "whsec_test".to_string(),
            engine_url: "http://localhost:9000/run".to_string(),
            engine_timeout_secs: 30,
            billing_price_pro: Some("price_pro_monthly".to_string()),
            billing_price_pro_plus: Some("price_pro_plus_monthly".to_string()),
            billing_price_enterprise: None,
        }
    }

    #[test]
    fn resolves_configured_prices() {
        let table = PriceTable::from_config(&config_with_prices());
        assert_eq!(table.resolve("price_pro_monthly"), Some(Plan::Pro));
        assert_eq!(table.resolve("price_pro_plus_monthly"), Some(Plan::ProPlus));
    }

    #[test]
    fn unknown_price_resolves_to_none() {
        let table = PriceTable::from_config(&config_with_prices());
        assert_eq!(table.resolve("price_enterprise_annual"), None);
        assert_eq!(table.resolve(""), None);
    }
}
