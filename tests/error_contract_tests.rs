//! Tests for the externally visible error contract.
//!
//! Execution clients must be able to tell an auth failure (401) from quota
//! exhaustion (429), and the dashboard relies on the structured numbers in
//! key-limit and quota errors. These drive the public error surface the
//! handlers return.

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use entitlement_service::AppError;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body is small and complete");
    serde_json::from_slice(&bytes).expect("error bodies are JSON")
}

#[tokio::test]
async fn quota_exhaustion_is_429_with_the_numbers() {
    let response = AppError::QuotaExceeded {
        limit: 100,
        used: 100,
    }
    .into_response();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "quota_exceeded");
    assert_eq!(body["error"]["details"]["limit"], 100);
    assert_eq!(body["error"]["details"]["used"], 100);
    assert_eq!(body["error"]["details"]["remaining"], 0);
}

#[tokio::test]
async fn auth_failure_stays_distinguishable_from_exhaustion() {
    let auth = AppError::InvalidApiKey.into_response();
    let quota = AppError::QuotaExceeded {
        limit: 100,
        used: 100,
    }
    .into_response();

    assert_eq!(auth.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(quota.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_ne!(auth.status(), quota.status());
}

#[tokio::test]
async fn revoked_and_unknown_keys_are_indistinguishable() {
    // Both paths produce the same variant, so the responses cannot differ
    let unknown = body_json(AppError::InvalidApiKey.into_response()).await;
    let revoked = body_json(AppError::InvalidApiKey.into_response()).await;
    assert_eq!(unknown, revoked);
    assert_eq!(unknown["error"]["code"], "invalid_api_key");
}

#[tokio::test]
async fn key_limit_carries_slots_for_the_dashboard() {
    let response = AppError::KeyLimitReached { used: 5, max: 5 }.into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "key_limit_reached");
    assert_eq!(body["error"]["details"]["used"], 5);
    assert_eq!(body["error"]["details"]["max"], 5);
    assert_eq!(body["error"]["details"]["remaining"], 0);
}

#[tokio::test]
async fn store_failure_is_retryable_not_exhaustion() {
    // An indeterminate usage count surfaces as 503, never as a 429 the
    // caller would misread as a real quota decision
    let response = AppError::Database(sqlx::Error::PoolTimedOut).into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "store_unavailable");
}

#[tokio::test]
async fn error_bodies_never_carry_secret_material() {
    let secret = "sk_0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    for error in [
        AppError::InvalidApiKey,
        AppError::KeyNotFound,
        AppError::KeyLimitReached { used: 2, max: 2 },
        AppError::QuotaExceeded { limit: 100, used: 100 },
    ] {
        let body = body_json(error.into_response()).await.to_string();
        assert!(!body.contains(secret));
        assert!(!body.contains("secret"));
    }
}
