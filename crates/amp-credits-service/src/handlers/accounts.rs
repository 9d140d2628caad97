//! Account management handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use amp_credits_core::{SubscriptionStatus, Tier};
use amp_credits_store::AccountState;

use crate::auth::AuthAccount;
use crate::error::ApiError;
use crate::state::AppState;

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub account_id: String,
    /// Current balance in credits.
    pub balance: i64,
    /// Whether the wallet is locked.
    pub is_locked: bool,
    /// Subscription tier.
    pub tier: Tier,
    /// Subscription status.
    pub status: SubscriptionStatus,
    /// Current billing cycle start.
    pub cycle_start: String,
    /// Current billing cycle end (next allowance reset).
    pub cycle_end: String,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&AccountState> for AccountResponse {
    fn from(state: &AccountState) -> Self {
        Self {
            account_id: state.wallet.account_id.to_string(),
            balance: state.wallet.balance,
            is_locked: state.wallet.is_locked,
            tier: state.subscription.tier,
            status: state.subscription.status,
            cycle_start: state.wallet.cycle_start.to_rfc3339(),
            cycle_end: state.wallet.cycle_end.to_rfc3339(),
            created_at: state.wallet.created_at.to_rfc3339(),
        }
    }
}

/// Provision a new account with an empty wallet and free-tier subscription.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.store.create_account(auth.account_id, Utc::now())?;

    tracing::info!(account_id = %auth.account_id, "Account created");

    Ok(Json(AccountResponse::from(&account)))
}

/// Get the current account.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.store.get_state(&auth.account_id)?;

    Ok(Json(AccountResponse::from(&account)))
}

/// Archive the current account. The ledger is retained; the wallet stops
/// accepting mutations.
pub async fn archive_account(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.archive_account(&auth.account_id, Utc::now())?;

    tracing::info!(account_id = %auth.account_id, "Account archived");

    Ok(Json(serde_json::json!({ "archived": true })))
}
