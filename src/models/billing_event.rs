//! Billing provider webhook payload types.
//!
//! The provider delivers an event envelope `{id, type, created, data}` where
//! `data.object` is the affected resource. Delivery is at-least-once and
//! unordered; every timestamp here is the provider's own clock (unix
//! seconds), never local arrival time.

use serde::Deserialize;

/// Provider event envelope as delivered to `POST /webhooks/billing`.
#[derive(Debug, Deserialize)]
pub struct BillingEventEnvelope {
    /// Provider-assigned event id, the idempotency token
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Provider-recorded creation time of the event (unix seconds)
    pub created: i64,

    pub data: BillingEventData,
}

#[derive(Debug, Deserialize)]
pub struct BillingEventData {
    /// The affected resource; its shape depends on `event_type`
    pub object: serde_json::Value,
}

/// `data.object` for `checkout.completed`.
///
/// The only event that carries the user's identity: the checkout session
/// echoes back the `user_id` the dashboard embedded when starting checkout.
#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    /// Opaque user id embedded at checkout start
    pub client_reference_id: String,

    /// Billing customer created for this user
    pub customer: String,

    /// Subscription created by the checkout
    pub subscription: String,
}

/// `data.object` for `subscription.*` events.
#[derive(Debug, Deserialize)]
pub struct SubscriptionObject {
    /// Provider's subscription id
    pub id: String,

    /// Billing customer owning the subscription
    pub customer: String,

    /// Provider's raw status: active, trialing, past_due, unpaid,
    /// canceled, expired
    pub status: String,

    /// True when the subscription will lapse at `current_period_end`
    /// instead of renewing
    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// End of the current paid period (unix seconds)
    pub current_period_end: Option<i64>,

    /// Price backing the subscription, resolved via the price table
    pub price_id: Option<String>,

    /// Provider-recorded update time of the subscription resource (unix
    /// seconds). The total order for a subscription is derived from this
    /// field, not from arrival order.
    pub updated_at: i64,
}

/// `data.object` for `invoice.payment_failed`.
#[derive(Debug, Deserialize)]
pub struct InvoiceObject {
    /// Billing customer the invoice belongs to
    pub customer: String,
}
