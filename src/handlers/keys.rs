//! HTTP handlers for API key management.
//!
//! Consumed by the dashboard with an authenticated user session (not an
//! API key). The raw secret appears in exactly two responses - provision
//! and rotate - and in no other response, ever.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::SessionContext;
use crate::models::api_key::{ApiKeyResponse, CreateKeyRequest, ProvisionedKeyResponse};
use crate::services::keys;
use crate::state::AppState;

/// Provision a new API key.
///
/// # Request Body
///
/// ```json
/// { "label": "production" }
/// ```
///
/// # Response
///
/// Returns 201 Created. The `secret` is only returned here, never again.
///
/// ```json
/// {
///   "key_id": "550e8400-e29b-41d4-a716-446655440000",
///   "label": "production",
///   "secret": "sk_a1b2c3..."
/// }
/// ```
///
/// Returns 409 with `{used, max}` details when the account already holds
/// its plan's maximum number of active keys.
pub async fn create_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<CreateKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.label.trim().is_empty() {
        return Err(AppError::InvalidRequest("Label must not be empty".to_string()));
    }

    let key = keys::provision(&state.pool, session.account.id, request.label.trim()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProvisionedKeyResponse {
            key_id: key.id,
            label: key.label,
            secret: key.secret,
        }),
    ))
}

/// Rotate an API key: revoke it and issue a replacement with the same
/// label, atomically.
///
/// # Response
///
/// Returns 200 with the replacement key and its raw secret (the only time
/// that secret is shown). The old secret stops verifying the moment this
/// call returns; there is no grace window.
pub async fn rotate_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(key_id): Path<Uuid>,
) -> Result<Json<ProvisionedKeyResponse>, AppError> {
    let key = keys::rotate(&state.pool, session.account.id, key_id).await?;

    Ok(Json(ProvisionedKeyResponse {
        key_id: key.id,
        label: key.label,
        secret: key.secret,
    }))
}

/// Revoke an API key.
///
/// # Response
///
/// Returns 200 `{}`. Revoking an already-revoked key is a success, so the
/// dashboard can retry safely. Returns 404 if the key does not exist under
/// the caller's account - whether it exists elsewhere is not revealed.
pub async fn revoke_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(key_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    keys::revoke(&state.pool, session.account.id, key_id).await?;

    Ok(Json(json!({})))
}

/// List the account's keys, newest first.
///
/// # Response
///
/// Returns key metadata only - never a secret hash, never a raw secret.
///
/// ```json
/// [
///   {
///     "key_id": "550e8400-e29b-41d4-a716-446655440000",
///     "label": "production",
///     "status": "active",
///     "created_at": "2026-07-15T10:30:00Z"
///   }
/// ]
/// ```
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = keys::list_keys(&state.pool, session.account.id).await?;

    Ok(Json(keys.into_iter().map(Into::into).collect()))
}
