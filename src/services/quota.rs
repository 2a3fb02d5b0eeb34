//! Quota gate - admit or reject a metered execution before it runs.
//!
//! Admission is check-then-act: the gate counts already-settled usage and
//! compares it to the account's monthly limit. Nothing is reserved, so a
//! burst of concurrent requests can overshoot the limit by at most the
//! number of requests in flight at the moment the limit is crossed. That
//! looseness is deliberate; executions are long and can fail after
//! starting, and reserving/rolling back quota costs more than it buys.

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        account::{Account, Plan},
        usage::NewUsageEvent,
    },
};

/// A granted admission, carrying the numbers the caller may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
}

/// Decide whether an account may run one more metered execution.
///
/// `used` is the count of 2xx usage events in the account's current billing
/// window, read fresh from the ledger on every call. On rejection the
/// caller must not execute the work and must not append a usage event.
///
/// A failed count query surfaces as a store error (503), never as
/// exhaustion and never as admission.
pub async fn admit(pool: &DbPool, account: &Account) -> Result<Admission, AppError> {
    let used = used_in_current_window(pool, account).await?;
    evaluate(account.monthly_limit, used)
}

/// Count of quota-consuming (2xx) usage events for the account in its
/// current billing window. Also feeds the dashboard plan summary.
pub async fn used_in_current_window(pool: &DbPool, account: &Account) -> Result<i64, AppError> {
    let (start, end) = usage_window(account, Utc::now());

    let used: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM usage_events
        WHERE account_id = $1
          AND status_code >= 200 AND status_code < 300
          AND created_at >= $2 AND created_at < $3
        "#,
    )
    .bind(account.id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(used)
}

/// Append one usage event recording the real outcome of an admitted
/// attempt. The ledger is append-only; this is its sole writer.
pub async fn record_usage(pool: &DbPool, event: &NewUsageEvent) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO usage_events (account_id, api_key_id, status_code, duration_ms, error_code)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(event.account_id)
    .bind(event.api_key_id)
    .bind(event.status_code)
    .bind(event.duration_ms)
    .bind(event.error_code.as_deref())
    .execute(pool)
    .await?;

    Ok(())
}

/// The pure admission decision.
pub(crate) fn evaluate(limit: i64, used: i64) -> Result<Admission, AppError> {
    if used >= limit {
        return Err(AppError::QuotaExceeded { limit, used });
    }
    Ok(Admission {
        limit,
        used,
        remaining: limit - used,
    })
}

/// The billing window usage is counted over.
///
/// Calendar month (UTC) for every plan except enterprise: an enterprise
/// account with a known `current_period_end` is metered over the provider
/// billing period ending there, falling back to the calendar month when the
/// period is unknown or does not bracket `now`.
pub fn usage_window(account: &Account, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    if account.plan() == Plan::Enterprise {
        if let Some(end) = account.current_period_end {
            if let Some(start) = end.checked_sub_months(Months::new(1)) {
                if start <= now && now < end {
                    return (start, end);
                }
            }
        }
    }
    calendar_month(now)
}

/// UTC calendar month containing `now`, as a half-open interval.
fn calendar_month(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("first day of month is a valid timestamp");

    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .expect("first day of month is a valid timestamp");

    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn account(plan: Plan, current_period_end: Option<DateTime<Utc>>) -> Account {
        Account {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            billing_customer_id: None,
            billing_subscription_id: None,
            billing_price_id: None,
            plan: plan.as_str().to_string(),
            monthly_limit: plan.monthly_limit(),
            max_keys: plan.max_keys(),
            status: "active".to_string(),
            current_period_end,
            billing_updated_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid timestamp")
    }

    #[test]
    fn exhausted_free_account_is_rejected() {
        let err = evaluate(100, 100).expect_err("limit reached");
        match err {
            AppError::QuotaExceeded { limit, used } => {
                assert_eq!(limit, 100);
                assert_eq!(used, 100);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }

    #[test]
    fn overshoot_is_still_rejected() {
        // used can legitimately sit above the limit after a concurrent
        // burst; the gate keeps rejecting
        assert!(evaluate(100, 103).is_err());
    }

    #[test]
    fn admission_reports_remaining() {
        let admission = evaluate(2_000, 412).expect("under limit");
        assert_eq!(admission.remaining, 1_588);
    }

    #[test]
    fn last_slot_is_admitted() {
        let admission = evaluate(100, 99).expect("one left");
        assert_eq!(admission.remaining, 1);
    }

    #[test]
    fn window_is_calendar_month() {
        let account = account(Plan::Pro, None);
        let (start, end) = usage_window(&account, ts("2026-08-04T12:30:00Z"));
        assert_eq!(start, ts("2026-08-01T00:00:00Z"));
        assert_eq!(end, ts("2026-09-01T00:00:00Z"));
    }

    #[test]
    fn window_wraps_year_boundary() {
        let account = account(Plan::Free, None);
        let (start, end) = usage_window(&account, ts("2026-12-31T23:59:59Z"));
        assert_eq!(start, ts("2026-12-01T00:00:00Z"));
        assert_eq!(end, ts("2027-01-01T00:00:00Z"));
    }

    #[test]
    fn enterprise_window_follows_billing_period() {
        let account = account(Plan::Enterprise, Some(ts("2026-08-20T00:00:00Z")));
        let (start, end) = usage_window(&account, ts("2026-08-04T12:00:00Z"));
        assert_eq!(start, ts("2026-07-20T00:00:00Z"));
        assert_eq!(end, ts("2026-08-20T00:00:00Z"));
    }

    #[test]
    fn enterprise_with_stale_period_falls_back_to_month() {
        // period ended in the past; meter over the calendar month instead
        let account = account(Plan::Enterprise, Some(ts("2026-07-20T00:00:00Z")));
        let (start, end) = usage_window(&account, ts("2026-08-04T12:00:00Z"));
        assert_eq!(start, ts("2026-08-01T00:00:00Z"));
        assert_eq!(end, ts("2026-09-01T00:00:00Z"));
    }
}
