//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Transient store errors**: any sqlx::Error; retryable, surfaced as 503
///   on the API surface (the webhook handler maps it to 500 itself so the
///   provider redelivers)
/// - **Authentication errors**: missing session identity, invalid or revoked
///   API keys - always 401, and a revoked key is indistinguishable from an
///   unknown one
/// - **Structured business errors**: key limit and quota exhaustion carry
///   their numbers for client messaging
/// - **Validation errors**: malformed or unsigned requests, rejected before
///   any state access
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Durable store unavailable or query failed (retryable).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Store error: {0}")]
    Database(#[from] sqlx::Error),

    /// No user identity on a dashboard request.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Missing or invalid session identity")]
    Unauthenticated,

    /// Bearer key is missing, malformed, unknown, or revoked.
    ///
    /// Returns HTTP 401 Unauthorized. Deliberately does not distinguish
    /// a revoked key from one that never existed.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Requested account does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Account not found")]
    AccountNotFound,

    /// Key does not exist under the caller's account.
    ///
    /// Returns HTTP 404 Not Found. The same response is produced whether
    /// the key is absent entirely or owned by a different account.
    #[error("API key not found")]
    KeyNotFound,

    /// Account already holds `max` active keys.
    ///
    /// Returns HTTP 409 Conflict with the numbers for dashboard messaging.
    #[error("Key limit reached ({used} of {max} keys in use)")]
    KeyLimitReached { used: i64, max: i64 },

    /// Account has consumed its monthly execution quota.
    ///
    /// Returns HTTP 429 Too Many Requests with `{limit, used, remaining}`.
    /// Kept distinguishable from 401 so execution clients can tell an auth
    /// failure from exhaustion.
    #[error("Monthly execution quota exceeded ({used} of {limit})")]
    QuotaExceeded { limit: i64, used: i64 },

    /// Webhook signature verification failed.
    ///
    /// Returns HTTP 400 Bad Request, before any state is read.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// The execution engine could not be reached after admission.
    ///
    /// Returns HTTP 502 Bad Gateway. The attempt is still recorded in the
    /// usage ledger with an error code.
    #[error("Execution engine unavailable")]
    EngineUnavailable,
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// `KeyLimitReached` and `QuotaExceeded` additionally carry a `details`
/// object with their numbers.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message, details)
        let (status, code, message, details) = match self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                self.to_string(),
                None,
            ),
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
                None,
            ),
            AppError::AccountNotFound => (
                StatusCode::NOT_FOUND,
                "account_not_found",
                self.to_string(),
                None,
            ),
            AppError::KeyNotFound => {
                (StatusCode::NOT_FOUND, "key_not_found", self.to_string(), None)
            }
            AppError::KeyLimitReached { used, max } => (
                StatusCode::CONFLICT,
                "key_limit_reached",
                self.to_string(),
                Some(json!({
                    "used": used,
                    "max": max,
                    "remaining": (max - used).max(0),
                })),
            ),
            AppError::QuotaExceeded { limit, used } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                self.to_string(),
                Some(json!({
                    "limit": limit,
                    "used": used,
                    "remaining": 0,
                })),
            ),
            AppError::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "invalid_signature",
                self.to_string(),
                None,
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone(), None)
            }
            AppError::EngineUnavailable => (
                StatusCode::BAD_GATEWAY,
                "engine_unavailable",
                self.to_string(),
                None,
            ),
            // Retryable: clients and the provider should try again
            AppError::Database(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "Temporary storage failure, retry the request".to_string(),
                None,
            ),
        };

        // Build JSON response body
        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exceeded_maps_to_429() {
        let response = AppError::QuotaExceeded { limit: 100, used: 100 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn auth_failures_map_to_401() {
        let response = AppError::InvalidApiKey.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn store_failure_is_retryable_not_quota() {
        // A failed usage count must never surface as quota exhaustion
        let response = AppError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn key_limit_maps_to_409() {
        let response = AppError::KeyLimitReached { used: 2, max: 2 }.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
