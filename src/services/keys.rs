//! API key lifecycle - provision, rotate, revoke, verify.
//!
//! Keys are bearer credentials gating the metered execution endpoint. The
//! raw secret is returned exactly once from provision/rotate; only its
//! SHA-256 hash is stored, so a secret can never be recovered afterwards.
//!
//! # Atomicity Guarantees
//!
//! Provisioning locks the owning account row for the duration of its
//! transaction, so two concurrent provision calls for the same account
//! serialize and cannot both slip past the key limit. Rotation revokes and
//! reissues inside one transaction; no state with the old key usable or the
//! slot empty is ever committed.

use crate::{db::DbPool, error::AppError, models::api_key::ApiKey};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A freshly provisioned credential. The `secret` field is the only copy of
/// the raw secret that will ever exist on the server side.
#[derive(Debug)]
pub struct ProvisionedKey {
    pub id: Uuid,
    pub label: String,
    pub secret: String,
}

/// Identity attached to a verified bearer secret.
#[derive(Debug, Clone)]
pub struct KeyIdentity {
    pub account_id: Uuid,
    pub api_key_id: Uuid,
}

/// Provision a new API key for an account.
///
/// # Process
///
/// 1. Lock the account row (serializes concurrent provisioning per account)
/// 2. Conditionally insert the key only while the active-key count is below
///    the account's `max_keys` - the check and the insert are one statement
/// 3. Return the raw secret exactly once
///
/// # Errors
///
/// - `AccountNotFound`: account doesn't exist
/// - `KeyLimitReached`: account already holds `max_keys` active keys;
///   carries the numbers for dashboard messaging
pub async fn provision(
    pool: &DbPool,
    account_id: Uuid,
    label: &str,
) -> Result<ProvisionedKey, AppError> {
    let mut tx = pool.begin().await?;

    // Lock the account row; concurrent provision calls for this account
    // queue behind the lock instead of racing the count below
    let max_keys: i32 = sqlx::query_scalar("SELECT max_keys FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    let secret = generate_secret();
    let secret_hash = hash_secret(&secret);

    // Limit check and insert in a single conditional statement
    let inserted = sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (account_id, label, secret_hash)
        SELECT $1, $2, $3
        WHERE (SELECT COUNT(*) FROM api_keys WHERE account_id = $1 AND status = 'active') < $4
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(label)
    .bind(&secret_hash)
    .bind(max_keys as i64)
    .fetch_optional(&mut *tx)
    .await?;

    let key = match inserted {
        Some(key) => key,
        None => {
            let used = count_active_keys_tx(&mut tx, account_id).await?;
            tx.rollback().await?;
            return Err(AppError::KeyLimitReached {
                used,
                max: max_keys as i64,
            });
        }
    };

    tx.commit().await?;

    Ok(ProvisionedKey {
        id: key.id,
        label: key.label,
        secret,
    })
}

/// Rotate an API key: revoke it and issue a replacement under one
/// transaction.
///
/// The replacement shares the revoked key's label and reuses its slot, so
/// no limit check is needed. After the transaction commits the old secret
/// fails verification and the new one succeeds; before the commit nothing
/// has changed. There is no grace window for the old secret.
///
/// # Errors
///
/// - `KeyNotFound`: no active key with this id under the caller's account
///   (rotating an already-revoked key is not resumable - provision instead)
pub async fn rotate(
    pool: &DbPool,
    account_id: Uuid,
    key_id: Uuid,
) -> Result<ProvisionedKey, AppError> {
    let mut tx = pool.begin().await?;

    // Revoke the existing key, scoped to the caller's account so a key id
    // under a different account is indistinguishable from a missing one
    let label: String = sqlx::query_scalar(
        r#"
        UPDATE api_keys
        SET status = 'revoked', revoked_at = NOW()
        WHERE id = $1 AND account_id = $2 AND status = 'active'
        RETURNING label
        "#,
    )
    .bind(key_id)
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::KeyNotFound)?;

    let secret = generate_secret();
    let secret_hash = hash_secret(&secret);

    // The slot was freed by the revocation in this same transaction
    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (account_id, label, secret_hash)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(account_id)
    .bind(&label)
    .bind(&secret_hash)
    .fetch_one(&mut *tx)
    .await?;

    // Both effects become visible atomically
    tx.commit().await?;

    Ok(ProvisionedKey {
        id: key.id,
        label: key.label,
        secret,
    })
}

/// Revoke an API key.
///
/// Idempotent: revoking an already-revoked key owned by the caller is a
/// no-op success. A key that does not exist under the caller's account is
/// `KeyNotFound`, whether or not it exists elsewhere.
pub async fn revoke(pool: &DbPool, account_id: Uuid, key_id: Uuid) -> Result<(), AppError> {
    let updated = sqlx::query(
        r#"
        UPDATE api_keys
        SET status = 'revoked', revoked_at = NOW()
        WHERE id = $1 AND account_id = $2 AND status = 'active'
        "#,
    )
    .bind(key_id)
    .bind(account_id)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 1 {
        return Ok(());
    }

    // Nothing flipped: either the key is already revoked (fine) or it is
    // not ours / not there (404)
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM api_keys WHERE id = $1 AND account_id = $2)")
            .bind(key_id)
            .bind(account_id)
            .fetch_one(pool)
            .await?;

    if exists { Ok(()) } else { Err(AppError::KeyNotFound) }
}

/// List an account's keys, newest first. Secret hashes stay in this module;
/// callers get the entity and convert to a hash-free response type.
pub async fn list_keys(pool: &DbPool, account_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
    let keys = sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE account_id = $1 ORDER BY created_at DESC",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// Verify a presented bearer secret against the key store.
///
/// # Process
///
/// 1. Hash the presented secret with SHA-256
/// 2. Look up an **active** key with that hash
/// 3. Re-compare the digests with a comparison whose duration does not
///    depend on where the first mismatching byte sits
///
/// A hash match on a revoked key is a hard failure: the lookup only sees
/// active keys, so a rotated-away or revoked secret gets the same
/// `InvalidApiKey` as a secret that never existed.
pub async fn verify(pool: &DbPool, raw_secret: &str) -> Result<KeyIdentity, AppError> {
    let presented_hash = hash_secret(raw_secret);

    let key = sqlx::query_as::<_, ApiKey>(
        "SELECT * FROM api_keys WHERE secret_hash = $1 AND status = 'active'",
    )
    .bind(&presented_hash)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    if !digests_match(presented_hash.as_bytes(), key.secret_hash.as_bytes()) {
        return Err(AppError::InvalidApiKey);
    }

    Ok(KeyIdentity {
        account_id: key.account_id,
        api_key_id: key.id,
    })
}

/// Count of currently active keys for an account.
pub async fn count_active_keys(pool: &DbPool, account_id: Uuid) -> Result<i64, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE account_id = $1 AND status = 'active'")
            .bind(account_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

async fn count_active_keys_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    account_id: Uuid,
) -> Result<i64, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE account_id = $1 AND status = 'active'")
            .bind(account_id)
            .fetch_one(&mut **tx)
            .await?;

    Ok(count)
}

/// Generate a new bearer secret: `sk_` plus 64 hex characters (32 random
/// bytes).
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("sk_{}", hex::encode(bytes))
}

/// SHA-256 hex digest of a raw secret. The only form ever persisted.
pub fn hash_secret(raw_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two digests without short-circuiting on the first mismatch.
///
/// Every byte is visited regardless of where a difference occurs, so the
/// comparison time does not reveal a matching prefix length.
pub fn digests_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_have_prefix_and_length() {
        let secret = generate_secret();
        assert!(secret.starts_with("sk_"));
        // 32 bytes hex-encoded after the prefix
        assert_eq!(secret.len(), 3 + 64);
    }

    #[test]
    fn secrets_are_unique() {
        assert_ne!(generate_secret(), generate_secret());
    }

    #[test]
    fn hash_is_sha256_hex() {
        let hash = hash_secret("sk_test");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic
        assert_eq!(hash, hash_secret("sk_test"));
    }

    #[test]
    fn different_secrets_hash_differently() {
        assert_ne!(hash_secret("sk_a"), hash_secret("sk_b"));
    }

    #[test]
    fn digest_comparison() {
        assert!(digests_match(b"abcd", b"abcd"));
        assert!(!digests_match(b"abcd", b"abce"));
        assert!(!digests_match(b"abcd", b"abc"));
        assert!(!digests_match(b"", b"a"));
        assert!(digests_match(b"", b""));
    }
}
