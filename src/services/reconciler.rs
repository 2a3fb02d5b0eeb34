//! Account state reconciler - billing webhook events to account mutations.
//!
//! The billing provider delivers events at-least-once, possibly duplicated,
//! possibly out of order. Every event becomes at most one account mutation,
//! applied under two guards:
//!
//! - **Idempotency**: the provider event id is inserted into
//!   `billing_events` inside the same transaction as the mutation; a replay
//!   hits the primary key and is acknowledged without reapplying effects.
//! - **Strictly newer wins**: subscription state carries the provider's own
//!   recorded update time, and the account mutation is a single conditional
//!   UPDATE that only fires when that time is newer than the last applied
//!   one (`billing_updated_at`). Arrival order never decides; two racing
//!   deliveries for the same account serialize on the row lock and the
//!   stale one becomes a no-op.
//!
//! Signature verification happens before any parse or state read. A store
//! failure anywhere rolls the whole event back and surfaces as retryable,
//! so the provider redelivers; success is never acknowledged without a
//! committed mutation.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    config::PriceTable,
    db::DbPool,
    error::AppError,
    models::{
        account::{AccountStatus, Plan},
        billing_event::{BillingEventEnvelope, CheckoutSession, InvoiceObject, SubscriptionObject},
    },
};

type HmacSha256 = Hmac<Sha256>;

/// The single account mutation an event maps to.
///
/// Computed by [`plan_transition`] without touching the store, then applied
/// as one SQL statement. Keeping the mapping pure is what makes the
/// event-to-transition policy directly testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountTransition {
    /// `checkout.completed`: attach billing identifiers to the account
    /// that started the checkout. Plan and quota are untouched; the
    /// subscription events that always follow carry those.
    AttachBilling {
        user_id: String,
        customer_id: String,
        subscription_id: String,
    },

    /// `subscription.created` / `subscription.updated`: adopt the
    /// subscription's plan and status as of `observed_at`.
    SyncSubscription {
        customer_id: String,
        subscription_id: String,
        price_id: String,
        plan: Plan,
        status: AccountStatus,
        current_period_end: Option<DateTime<Utc>>,
        observed_at: DateTime<Utc>,
    },

    /// `subscription.deleted`: the only event that forcibly downgrades -
    /// back to the free tier, canceled, billing linkage cleared.
    Downgrade {
        customer_id: String,
        observed_at: DateTime<Utc>,
    },

    /// `invoice.payment_failed`: degrade standing without touching
    /// entitlement size, so in-flight quota comparisons stay meaningful
    /// until a definitive cancellation arrives.
    MarkPastDue {
        customer_id: String,
        observed_at: DateTime<Utc>,
    },

    /// Acknowledge without mutating: unknown event types (forward
    /// compatibility), unmapped prices, unknown provider statuses.
    Ignore { reason: &'static str },
}

/// Verify the provider signature over the raw request body.
///
/// # Format
///
/// `X-Billing-Signature: sha256=<hex_encoded_hmac>` where the MAC is
/// HMAC-SHA256 over the exact bytes of the body.
///
/// Runs before any payload parse or state read; the comparison inside
/// `verify_slice` is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> Result<(), AppError> {
    let hex_digest = signature_header
        .strip_prefix("sha256=")
        .ok_or(AppError::InvalidSignature)?;

    let expected = hex::decode(hex_digest).map_err(|_| AppError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::InvalidSignature)
}

/// Process one verified billing event.
///
/// # Process
///
/// 1. Start a transaction
/// 2. Record the event id (`ON CONFLICT DO NOTHING`); zero rows means a
///    replay, which commits and acknowledges without reapplying
/// 3. Map the event to its transition (pure)
/// 4. Apply the transition as a single conditional UPDATE
/// 5. Commit - the event record and the mutation land atomically
pub async fn handle_event(
    pool: &DbPool,
    prices: &PriceTable,
    envelope: &BillingEventEnvelope,
    payload: &serde_json::Value,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let fresh = sqlx::query(
        r#"
        INSERT INTO billing_events (id, event_type, payload)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&envelope.id)
    .bind(&envelope.event_type)
    .bind(payload)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    if !fresh {
        tx.commit().await?;
        tracing::info!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            "duplicate billing event acknowledged"
        );
        return Ok(());
    }

    let transition = plan_transition(envelope, prices)?;
    apply_transition(&mut tx, envelope, &transition).await?;

    tx.commit().await?;

    Ok(())
}

/// Map a billing event to the account transition it implies.
///
/// Pure policy: no store access. Malformed payloads error (the provider
/// gets a 400 and its delivery log shows the rejection); events this
/// service has no business reacting to come back as `Ignore`.
pub fn plan_transition(
    envelope: &BillingEventEnvelope,
    prices: &PriceTable,
) -> Result<AccountTransition, AppError> {
    match envelope.event_type.as_str() {
        "checkout.completed" => {
            let session: CheckoutSession = parse_object(&envelope.data.object)?;
            Ok(AccountTransition::AttachBilling {
                user_id: session.client_reference_id,
                customer_id: session.customer,
                subscription_id: session.subscription,
            })
        }

        "subscription.created" | "subscription.updated" => {
            let sub: SubscriptionObject = parse_object(&envelope.data.object)?;
            let observed_at = provider_timestamp(sub.updated_at)?;

            // Unmapped price: log and no-op, never guess a plan
            let Some(price_id) = sub.price_id else {
                return Ok(AccountTransition::Ignore {
                    reason: "subscription carries no price",
                });
            };
            let Some(plan) = prices.resolve(&price_id) else {
                tracing::warn!(
                    event_id = %envelope.id,
                    price_id = %price_id,
                    "subscription references an unmapped price"
                );
                return Ok(AccountTransition::Ignore {
                    reason: "unmapped price",
                });
            };

            let current_period_end = sub
                .current_period_end
                .map(provider_timestamp)
                .transpose()?;

            let Some(status) = map_subscription_status(
                &sub.status,
                sub.cancel_at_period_end,
                current_period_end.is_some_and(|end| end > observed_at),
            ) else {
                tracing::warn!(
                    event_id = %envelope.id,
                    provider_status = %sub.status,
                    "subscription carries an unknown status"
                );
                return Ok(AccountTransition::Ignore {
                    reason: "unknown subscription status",
                });
            };

            Ok(AccountTransition::SyncSubscription {
                customer_id: sub.customer,
                subscription_id: sub.id,
                price_id,
                plan,
                status,
                current_period_end,
                observed_at,
            })
        }

        "subscription.deleted" => {
            let sub: SubscriptionObject = parse_object(&envelope.data.object)?;
            Ok(AccountTransition::Downgrade {
                customer_id: sub.customer,
                observed_at: provider_timestamp(sub.updated_at)?,
            })
        }

        "invoice.payment_failed" => {
            let invoice: InvoiceObject = parse_object(&envelope.data.object)?;
            Ok(AccountTransition::MarkPastDue {
                customer_id: invoice.customer,
                observed_at: provider_timestamp(envelope.created)?,
            })
        }

        // Forward compatibility: acknowledge types we don't handle
        _ => Ok(AccountTransition::Ignore {
            reason: "unhandled event type",
        }),
    }
}

/// Map the provider's raw subscription status to an account status.
///
/// `cancel_at_period_end` on an otherwise-active subscription becomes
/// `Canceling` - the paid period runs out rather than renewing - and only
/// when the period end is known and still ahead of the provider's recorded
/// update time, keeping the canceling/period-end invariant intact. `None`
/// means the status is outside the known vocabulary and the event must not
/// be applied.
pub fn map_subscription_status(
    raw: &str,
    cancel_at_period_end: bool,
    period_end_ahead: bool,
) -> Option<AccountStatus> {
    match raw {
        "active" | "trialing" => {
            if cancel_at_period_end && period_end_ahead {
                Some(AccountStatus::Canceling)
            } else {
                Some(AccountStatus::Active)
            }
        }
        "past_due" | "unpaid" => Some(AccountStatus::PastDue),
        "canceled" | "expired" => Some(AccountStatus::Canceled),
        _ => None,
    }
}

/// Apply a transition as a single statement inside the event's transaction.
///
/// Zero affected rows is success: it means the event was stale (lost the
/// newer-wins comparison) or references an account this service has never
/// seen (e.g. provider test events), and the provider must not keep
/// retrying either case.
async fn apply_transition(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    envelope: &BillingEventEnvelope,
    transition: &AccountTransition,
) -> Result<(), AppError> {
    let affected = match transition {
        AccountTransition::AttachBilling {
            user_id,
            customer_id,
            subscription_id,
        } => {
            sqlx::query(
                r#"
                UPDATE accounts
                SET billing_customer_id = $2,
                    billing_subscription_id = $3,
                    updated_at = NOW()
                WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .bind(customer_id)
            .bind(subscription_id)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        }

        AccountTransition::SyncSubscription {
            customer_id,
            subscription_id,
            price_id,
            plan,
            status,
            current_period_end,
            observed_at,
        } => {
            sqlx::query(
                r#"
                UPDATE accounts
                SET plan = $2,
                    monthly_limit = $3,
                    max_keys = $4,
                    status = $5,
                    current_period_end = $6,
                    billing_subscription_id = $7,
                    billing_price_id = $8,
                    billing_updated_at = $9,
                    updated_at = NOW()
                WHERE billing_customer_id = $1
                  AND (billing_updated_at IS NULL OR billing_updated_at < $9)
                "#,
            )
            .bind(customer_id)
            .bind(plan.as_str())
            .bind(plan.monthly_limit())
            .bind(plan.max_keys())
            .bind(status.as_str())
            .bind(current_period_end)
            .bind(subscription_id)
            .bind(price_id)
            .bind(observed_at)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        }

        AccountTransition::Downgrade {
            customer_id,
            observed_at,
        } => {
            sqlx::query(
                r#"
                UPDATE accounts
                SET plan = $2,
                    monthly_limit = $3,
                    max_keys = $4,
                    status = 'canceled',
                    current_period_end = NULL,
                    billing_subscription_id = NULL,
                    billing_price_id = NULL,
                    billing_updated_at = $5,
                    updated_at = NOW()
                WHERE billing_customer_id = $1
                  AND (billing_updated_at IS NULL OR billing_updated_at < $5)
                "#,
            )
            .bind(customer_id)
            .bind(Plan::Free.as_str())
            .bind(Plan::Free.monthly_limit())
            .bind(Plan::Free.max_keys())
            .bind(observed_at)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        }

        AccountTransition::MarkPastDue {
            customer_id,
            observed_at,
        } => {
            sqlx::query(
                r#"
                UPDATE accounts
                SET status = 'past_due',
                    billing_updated_at = $2,
                    updated_at = NOW()
                WHERE billing_customer_id = $1
                  AND (billing_updated_at IS NULL OR billing_updated_at < $2)
                "#,
            )
            .bind(customer_id)
            .bind(observed_at)
            .execute(&mut **tx)
            .await?
            .rows_affected()
        }

        AccountTransition::Ignore { reason } => {
            tracing::debug!(
                event_id = %envelope.id,
                event_type = %envelope.event_type,
                reason,
                "billing event acknowledged without mutation"
            );
            return Ok(());
        }
    };

    if affected == 0 {
        tracing::warn!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            "billing event matched no account or lost newer-wins comparison"
        );
    } else {
        tracing::info!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            "billing event applied"
        );
    }

    Ok(())
}

fn parse_object<T: serde::de::DeserializeOwned>(object: &serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(object.clone())
        .map_err(|e| AppError::InvalidRequest(format!("Malformed event object: {e}")))
}

fn provider_timestamp(unix_seconds: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(unix_seconds, 0)
        .ok_or_else(|| AppError::InvalidRequest("Timestamp out of range".to_string()))
}
