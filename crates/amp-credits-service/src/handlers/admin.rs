//! Service-authenticated operational handlers.
//!
//! These endpoints are called by internal jobs and support tooling, not by
//! end users: billing-cycle rollover, wallet lock/unlock, and manual
//! credit grants.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use amp_credits_core::{AccountId, RolloverSummary, SubscriptionStatus, Tier, TransactionType};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

fn parse_account_id(raw: &str) -> Result<AccountId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))
}

/// Rollover trigger request.
#[derive(Debug, Deserialize)]
pub struct RolloverRequest {
    /// The account to roll over.
    pub account_id: String,
}

/// Rollover response.
#[derive(Debug, Serialize)]
pub struct RolloverResponse {
    /// False when the trigger was a duplicate for the current cycle.
    pub applied: bool,
    /// Start of the cycle after the rollover.
    pub cycle_start: String,
    /// End of the cycle after the rollover.
    pub cycle_end: String,
    /// Monthly credits granted into the wallet.
    pub granted_credits: i64,
    /// Tier in effect after the rollover.
    pub tier: Tier,
    /// Status in effect after the rollover.
    pub status: SubscriptionStatus,
}

impl From<RolloverSummary> for RolloverResponse {
    fn from(summary: RolloverSummary) -> Self {
        Self {
            applied: summary.applied,
            cycle_start: summary.cycle_start.to_rfc3339(),
            cycle_end: summary.cycle_end.to_rfc3339(),
            granted_credits: summary.granted_credits,
            tier: summary.tier,
            status: summary.status,
        }
    }
}

/// Trigger a billing-cycle rollover for one account. Duplicate triggers
/// within a cycle report `applied: false` and change nothing.
pub async fn rollover(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<RolloverRequest>,
) -> Result<Json<RolloverResponse>, ApiError> {
    let account_id = parse_account_id(&body.account_id)?;

    let summary = state
        .store
        .rollover(&account_id, &state.config.pricing, Utc::now())?;

    tracing::info!(
        account_id = %account_id,
        service = %auth.service_name,
        applied = %summary.applied,
        granted_credits = %summary.granted_credits,
        "Cycle rollover triggered"
    );

    Ok(Json(RolloverResponse::from(summary)))
}

/// Wallet lock request.
#[derive(Debug, Deserialize)]
pub struct WalletLockRequest {
    /// The account whose wallet to lock or unlock.
    pub account_id: String,
    /// Desired lock state.
    pub locked: bool,
}

/// Lock or unlock a wallet. A locked wallet rejects all spending but still
/// accepts credits.
pub async fn set_wallet_lock(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<WalletLockRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account_id = parse_account_id(&body.account_id)?;

    let wallet = state
        .store
        .set_wallet_lock(&account_id, body.locked, Utc::now())?;

    tracing::info!(
        account_id = %account_id,
        service = %auth.service_name,
        locked = %wallet.is_locked,
        "Wallet lock updated"
    );

    Ok(Json(serde_json::json!({
        "account_id": body.account_id,
        "is_locked": wallet.is_locked,
        "balance": wallet.balance
    })))
}

/// Credit grant request (bonus/refund/promo).
#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    /// The account to credit.
    pub account_id: String,
    /// Credit amount, must be positive.
    pub amount: i64,
    /// Transaction type (default: bonus). Debit types are rejected.
    #[serde(default = "default_grant_type")]
    pub transaction_type: TransactionType,
    /// Action type the grant relates to (refunds reference the refunded
    /// action).
    #[serde(default)]
    pub action_type: String,
    /// Reason recorded in the ledger entry.
    pub reason: String,
}

fn default_grant_type() -> TransactionType {
    TransactionType::Bonus
}

/// Grant credits to an account with a paired ledger entry.
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<GrantCreditsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account_id = parse_account_id(&body.account_id)?;

    let (balance, entry_id) = state.store.grant_credit(
        &account_id,
        body.transaction_type,
        &body.action_type,
        body.amount,
        body.reason.clone(),
        Utc::now(),
    )?;

    tracing::info!(
        account_id = %account_id,
        service = %auth.service_name,
        amount = %body.amount,
        transaction_type = ?body.transaction_type,
        reason = %body.reason,
        new_balance = %balance,
        "Credits granted"
    );

    Ok(Json(serde_json::json!({
        "balance": balance,
        "entry_id": entry_id.to_string()
    })))
}
