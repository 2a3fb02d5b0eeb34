//! Inbound billing provider webhook endpoint.
//!
//! The provider delivers events at-least-once and retries on anything but
//! a 2xx, so the status codes here are part of the retry contract:
//!
//! - `200 {"received": true}` - processed, duplicate, or deliberate no-op;
//!   the provider must not redeliver
//! - `400` - signature or payload validation failure; redelivery would
//!   fail the same way
//! - `500` - transient store failure; nothing was committed and the
//!   provider's retry will reprocess the event from scratch

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AppError;
use crate::models::billing_event::BillingEventEnvelope;
use crate::services::reconciler;
use crate::state::AppState;

/// Handle one billing provider delivery.
///
/// # Headers
///
/// ```text
/// X-Billing-Signature: sha256=<hex_encoded_hmac>
/// ```
///
/// The signature is verified over the raw body bytes before anything is
/// parsed or read from the store.
pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process(&state, &headers, &body).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),

        // Store failure: nothing committed, ask the provider to retry
        Err(AppError::Database(e)) => {
            tracing::error!("billing webhook store failure: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": {
                        "code": "store_unavailable",
                        "message": "Temporary storage failure, delivery will be retried"
                    }
                })),
            )
                .into_response()
        }

        // Validation and signature failures already map to 400
        Err(other) => other.into_response(),
    }
}

async fn process(state: &AppState, headers: &HeaderMap, body: &Bytes) -> Result<(), AppError> {
    // Fail closed: no signature, no parse, no state access
    let signature = headers
        .get("x-billing-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    reconciler::verify_signature(&state.config.billing_webhook_secret, body, signature)?;

    let payload: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Malformed event body: {e}")))?;
    let envelope: BillingEventEnvelope = serde_json::from_value(payload.clone())
        .map_err(|e| AppError::InvalidRequest(format!("Malformed event envelope: {e}")))?;

    reconciler::handle_event(&state.pool, &state.prices, &envelope, &payload).await
}
