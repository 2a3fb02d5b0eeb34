//! Account provisioning and the dashboard plan read model.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::account::{Account, PlanSummary},
    services::{keys, quota},
};

/// Fetch the account for a user, creating it on first contact.
///
/// Signup happens in the external identity provider; this service first
/// hears about a user when an authenticated request arrives. Creation is a
/// conditional insert keyed on the unique `user_id`, so concurrent first
/// requests still produce exactly one account, born on the free tier.
pub async fn get_or_create(pool: &DbPool, user_id: &str) -> Result<Account, AppError> {
    sqlx::query("INSERT INTO accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(account)
}

/// Fetch an account by id.
pub async fn fetch(pool: &DbPool, account_id: Uuid) -> Result<Account, AppError> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::AccountNotFound)
}

/// Build the dashboard plan summary for an account.
///
/// Usage and key counts are read fresh from the ledger and key store on
/// every call - entitlement state is never cached across requests.
pub async fn plan_summary(pool: &DbPool, account: &Account) -> Result<PlanSummary, AppError> {
    let used = quota::used_in_current_window(pool, account).await?;
    let keys_used = keys::count_active_keys(pool, account.id).await?;

    let plan = account.plan();

    Ok(PlanSummary {
        plan: plan.as_str(),
        plan_name: plan.display_name(),
        status: account.status().as_str().to_string(),
        monthly_limit: account.monthly_limit,
        used,
        remaining: (account.monthly_limit - used).max(0),
        max_keys: account.max_keys,
        keys_used,
        keys_remaining: (account.max_keys as i64 - keys_used).max(0),
        current_period_end: account.current_period_end,
    })
}
