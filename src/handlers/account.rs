//! Dashboard account plan endpoint.

use axum::{Extension, Json, extract::State};

use crate::error::AppError;
use crate::middleware::auth::SessionContext;
use crate::models::account::PlanSummary;
use crate::services::accounts;
use crate::state::AppState;

/// Get the authenticated user's plan, quota consumption, and key slots.
///
/// # Endpoint
///
/// `GET /api/v1/account/plan`
///
/// # Response
///
/// ```json
/// {
///   "plan": "pro",
///   "plan_name": "Pro",
///   "status": "canceling",
///   "monthly_limit": 2000,
///   "used": 412,
///   "remaining": 1588,
///   "max_keys": 5,
///   "keys_used": 2,
///   "keys_remaining": 3,
///   "current_period_end": "2026-08-31T00:00:00Z"
/// }
/// ```
///
/// Everything is recomputed from durable state for this request; there is
/// no process-wide cached entitlement to go stale.
pub async fn get_plan(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<PlanSummary>, AppError> {
    let summary = accounts::plan_summary(&state.pool, &session.account).await?;

    Ok(Json(summary))
}
