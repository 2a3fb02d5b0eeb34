//! Account data model and entitlement plan table.
//!
//! This module defines:
//! - `Plan` / `AccountStatus`: the entitlement vocabulary
//! - `Account`: database entity owning plan, quota, and billing linkage
//! - `PlanSummary`: response body for the dashboard plan endpoint

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Entitlement tier for an account.
///
/// A plan fixes both the monthly execution limit and the number of API keys
/// an account may hold at once. The derived values are never editable
/// independently; any code that writes `plan` to the database writes
/// `monthly_limit` and `max_keys` from this table in the same statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Free,
    Pro,
    ProPlus,
    Enterprise,
}

impl Plan {
    /// Stable identifier stored in the database and returned by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::ProPlus => "pro_plus",
            Plan::Enterprise => "enterprise",
        }
    }

    /// Parse a stored plan identifier. Returns `None` for anything outside
    /// the known vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            "pro_plus" => Some(Plan::ProPlus),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }

    /// Human-readable name shown in the dashboard.
    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Pro => "Pro",
            Plan::ProPlus => "Pro Plus",
            Plan::Enterprise => "Enterprise",
        }
    }

    /// Metered executions allowed per billing window.
    pub fn monthly_limit(&self) -> i64 {
        match self {
            Plan::Free => 100,
            Plan::Pro => 2_000,
            Plan::ProPlus => 10_000,
            Plan::Enterprise => 100_000,
        }
    }

    /// Maximum number of simultaneously active API keys.
    pub fn max_keys(&self) -> i32 {
        match self {
            Plan::Free => 2,
            Plan::Pro => 5,
            Plan::ProPlus => 10,
            Plan::Enterprise => 25,
        }
    }
}

/// Lifecycle standing of an account.
///
/// `Canceling` is distinct from `Canceled`: the subscription is still paid
/// through `current_period_end` but will not renew. `PastDue` degrades
/// standing without touching entitlement size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    PastDue,
    Canceling,
    Canceled,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::PastDue => "past_due",
            AccountStatus::Canceling => "canceling",
            AccountStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AccountStatus::Active),
            "past_due" => Some(AccountStatus::PastDue),
            "canceling" => Some(AccountStatus::Canceling),
            "canceled" => Some(AccountStatus::Canceled),
            _ => None,
        }
    }
}

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Belongs to exactly one user (`user_id`, set once at creation)
/// - Owns the authoritative plan/status/quota state
/// - Carries the billing provider linkage written only by the reconciler
///
/// The CHECK constraints on `plan` and `status` keep stored values inside
/// the vocabulary above, so the accessor fallbacks are unreachable in
/// practice.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Opaque identity supplied by the external identity provider.
    /// Set once, immutable, unique across accounts.
    pub user_id: String,

    /// Billing provider's customer id. Later provider events carry only
    /// this id, so reconciler lookups match on it rather than `user_id`.
    pub billing_customer_id: Option<String>,

    /// Billing provider's subscription id; cleared on `subscription.deleted`
    pub billing_subscription_id: Option<String>,

    /// Billing provider's price id backing the current plan
    pub billing_price_id: Option<String>,

    /// Current entitlement tier (see `Plan`)
    pub plan: String,

    /// Metered executions allowed per billing window, derived from `plan`
    pub monthly_limit: i64,

    /// Maximum simultaneously active API keys, derived from `plan`
    pub max_keys: i32,

    /// Lifecycle standing (see `AccountStatus`)
    pub status: String,

    /// End of the current paid period; non-null whenever status is
    /// `canceling`, null for free accounts
    pub current_period_end: Option<DateTime<Utc>>,

    /// Provider-recorded update time of the last applied billing event.
    /// The reconciler's strictly-newer-wins guard compares against this.
    pub billing_updated_at: Option<DateTime<Utc>>,

    /// Timestamp when the account was created
    pub created_at: DateTime<Utc>,

    /// Bumped on every mutation
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn plan(&self) -> Plan {
        Plan::parse(&self.plan).unwrap_or(Plan::Free)
    }

    pub fn status(&self) -> AccountStatus {
        AccountStatus::parse(&self.status).unwrap_or(AccountStatus::Active)
    }
}

/// Response body for `GET /api/v1/account/plan`.
///
/// The dashboard's single read model: entitlement, quota consumption, and
/// key slots, all recomputed from durable state on every request.
///
/// # JSON Example
///
/// ```json
/// {
///   "plan": "pro",
///   "plan_name": "Pro",
///   "status": "active",
///   "monthly_limit": 2000,
///   "used": 412,
///   "remaining": 1588,
///   "max_keys": 5,
///   "keys_used": 2,
///   "keys_remaining": 3
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub plan: &'static str,
    pub plan_name: &'static str,
    pub status: String,
    pub monthly_limit: i64,
    pub used: i64,
    pub remaining: i64,
    pub max_keys: i32,
    pub keys_used: i64,
    pub keys_remaining: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_identifiers_round_trip() {
        for plan in [Plan::Free, Plan::Pro, Plan::ProPlus, Plan::Enterprise] {
            assert_eq!(Plan::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(Plan::parse("platinum"), None);
    }

    #[test]
    fn status_identifiers_round_trip() {
        for status in [
            AccountStatus::Active,
            AccountStatus::PastDue,
            AccountStatus::Canceling,
            AccountStatus::Canceled,
        ] {
            assert_eq!(AccountStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AccountStatus::parse("paused"), None);
    }

    #[test]
    fn free_tier_limits() {
        assert_eq!(Plan::Free.monthly_limit(), 100);
        assert_eq!(Plan::Free.max_keys(), 2);
    }

    #[test]
    fn limits_grow_with_tier() {
        assert!(Plan::Pro.monthly_limit() > Plan::Free.monthly_limit());
        assert!(Plan::ProPlus.monthly_limit() > Plan::Pro.monthly_limit());
        assert!(Plan::Enterprise.monthly_limit() > Plan::ProPlus.monthly_limit());
        assert!(Plan::Enterprise.max_keys() > Plan::Free.max_keys());
    }
}
