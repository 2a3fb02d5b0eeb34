//! Authentication middleware for the two protected surfaces.
//!
//! - `session_auth` guards the dashboard key-management API. The identity
//!   provider in front of this service authenticates the user session and
//!   forwards the opaque user id in `X-User-Id`; this middleware trusts it
//!   and resolves (creating on first contact) the owning account.
//! - `api_key_auth` guards the metered execution endpoint with a bearer
//!   secret. Auth failures are always 401, and a revoked key is
//!   indistinguishable from an unknown one - but both stay distinguishable
//!   from the quota gate's 429.

use crate::{
    error::AppError,
    models::account::Account,
    services::{accounts, keys},
    state::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Context attached to authenticated dashboard requests.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// The caller's account, read fresh for this request
    pub account: Account,
}

/// Context attached to authenticated execution requests.
#[derive(Debug, Clone)]
pub struct KeyContext {
    pub account_id: Uuid,

    /// Which key authenticated the call; recorded in the usage ledger
    pub api_key_id: Uuid,
}

/// Dashboard session authentication.
///
/// # Flow
///
/// 1. Extract the opaque user id from the `X-User-Id` header
/// 2. Resolve the owning account, creating it on first contact
/// 3. Inject `SessionContext` into the request, call the next handler
pub async fn session_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = request
        .headers()
        .get("x-user-id")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(AppError::Unauthenticated)?
        .to_string();

    let account = accounts::get_or_create(&state.pool, &user_id).await?;

    request.extensions_mut().insert(SessionContext { account });

    Ok(next.run(request).await)
}

/// Bearer API key authentication for the execution endpoint.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <secret>` from the request
/// 2. Verify the secret against the key store (active keys only)
/// 3. Inject `KeyContext` into the request, call the next handler
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer sk_4f2a...
/// ```
pub async fn api_key_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    // Expected format: "Bearer <secret>"
    let raw_secret = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidApiKey)?;

    let identity = keys::verify(&state.pool, raw_secret).await?;

    request.extensions_mut().insert(KeyContext {
        account_id: identity.account_id,
        api_key_id: identity.api_key_id,
    });

    Ok(next.run(request).await)
}
