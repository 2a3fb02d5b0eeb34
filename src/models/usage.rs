//! Usage ledger entry for metered executions.

use uuid::Uuid;

/// A single metered execution attempt, appended after the quota gate has
/// admitted the request and the engine call has settled.
///
/// The ledger is append-only: entries are never updated or deleted, and
/// only entries with a 2xx `status_code` count toward quota consumption.
#[derive(Debug)]
pub struct NewUsageEvent {
    pub account_id: Uuid,

    /// Which key authenticated the call
    pub api_key_id: Uuid,

    /// HTTP status returned by the execution engine
    pub status_code: i32,

    pub duration_ms: i64,

    /// Engine-side failure classification, null on success
    pub error_code: Option<String>,
}
