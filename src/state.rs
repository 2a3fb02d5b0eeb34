//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, PriceTable};
use crate::db::DbPool;

/// State shared across all routes via Axum's `State` extractor.
///
/// Holds only process-wide resources: the connection pool, configuration,
/// the price→plan table, and the outbound HTTP client for the execution
/// engine. No account, key, or quota state is ever cached here; every
/// decision re-reads durable state.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub prices: Arc<PriceTable>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Result<Self, reqwest::Error> {
        let prices = PriceTable::from_config(&config);
        // Engine round-trips are bounded; a hung engine surfaces as an
        // error, not a stuck request
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.engine_timeout_secs))
            .build()?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            prices: Arc::new(prices),
            http,
        })
    }
}
