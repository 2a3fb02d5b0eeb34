//! API key model and request/response types.
//!
//! Keys are pure credentials: plan and quota live on the owning account.
//! Only the SHA-256 hash of a secret is stored; the raw secret exists in
//! exactly one provision/rotate response and is unrecoverable afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table. Rows are never deleted; revocation flips
/// `status` to `revoked` and stamps `revoked_at`, and a revoked key never
/// becomes active again.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this key
    pub id: Uuid,

    /// Owning account, immutable for the life of the key
    pub account_id: Uuid,

    /// Display name chosen by the user
    pub label: String,

    /// SHA-256 hash of the raw secret (64 hex characters)
    ///
    /// When a request comes in with "Bearer sk_abc...", we hash the
    /// presented secret and look up this column. The raw secret itself is
    /// never persisted.
    pub secret_hash: String,

    /// Either "active" or "revoked"
    pub status: String,

    /// Timestamp when this key was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of revocation, null while the key is active
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Request body for provisioning a new key.
///
/// ```json
/// { "label": "production" }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub label: String,
}

/// Response for list/get operations. Never carries the secret hash.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub key_id: Uuid,
    pub label: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            key_id: key.id,
            label: key.label,
            status: key.status,
            created_at: key.created_at,
        }
    }
}

/// Response for provision and rotate: the only place a raw secret appears.
#[derive(Debug, Serialize)]
pub struct ProvisionedKeyResponse {
    pub key_id: Uuid,
    pub label: String,
    pub secret: String,
}
