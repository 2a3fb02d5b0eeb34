//! Metered execution endpoint.
//!
//! The execution engine itself is an external service; this handler is the
//! gate in front of it. A request must present a valid bearer key (the
//! auth middleware already ran), pass the quota gate, and only then is the
//! work dispatched. Exactly one usage event is appended per admitted
//! attempt, recording the engine's real outcome - rejected requests (401
//! or 429) append nothing.

use std::time::Instant;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::middleware::auth::KeyContext;
use crate::models::usage::NewUsageEvent;
use crate::services::{accounts, quota};
use crate::state::AppState;

/// Run one metered execution.
///
/// # Endpoint
///
/// `POST /api/v1/execute` with `Authorization: Bearer sk_...`
///
/// # Failure modes
///
/// - `401` - invalid or revoked key (from the auth middleware)
/// - `429` - quota exceeded, with `{limit, used, remaining}` details;
///   deliberately distinguishable from 401
/// - `502` - engine unreachable; the attempt is still recorded
///
/// On success the engine's status code and JSON body are passed through.
pub async fn execute(
    State(state): State<AppState>,
    Extension(key): Extension<KeyContext>,
    Json(request): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    // Limits live on the account, not the key; re-read authoritative state
    let account = accounts::fetch(&state.pool, key.account_id).await?;

    // Returns QuotaExceeded before any work runs or is recorded
    quota::admit(&state.pool, &account).await?;

    let started = Instant::now();
    let dispatch = state
        .http
        .post(&state.config.engine_url)
        .json(&request)
        .send()
        .await;
    let duration_ms = started.elapsed().as_millis() as i64;

    match dispatch {
        Ok(engine_response) => {
            let status_code = engine_response.status().as_u16() as i32;
            let body = engine_response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null);

            // Only 2xx outcomes consume quota; the ledger records the rest
            // for operator visibility
            let error_code = if (200..300).contains(&status_code) {
                None
            } else {
                Some("engine_error".to_string())
            };

            quota::record_usage(
                &state.pool,
                &NewUsageEvent {
                    account_id: key.account_id,
                    api_key_id: key.api_key_id,
                    status_code,
                    duration_ms,
                    error_code,
                },
            )
            .await?;

            let status = StatusCode::from_u16(status_code as u16).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((status, Json(body)).into_response())
        }

        Err(e) => {
            tracing::error!("execution engine dispatch failed: {e}");

            // The attempt happened; record it (non-2xx, so no quota cost)
            quota::record_usage(
                &state.pool,
                &NewUsageEvent {
                    account_id: key.account_id,
                    api_key_id: key.api_key_id,
                    status_code: 502,
                    duration_ms,
                    error_code: Some("engine_unreachable".to_string()),
                },
            )
            .await?;

            Err(AppError::EngineUnavailable)
        }
    }
}
