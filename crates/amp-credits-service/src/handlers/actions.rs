//! Action quote and commit handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use amp_credits_core::{ensure_quantity, Quote};

use crate::auth::AuthAccount;
use crate::error::ApiError;
use crate::state::AppState;

/// Action request body (shared by check and perform).
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    /// The action type to perform.
    pub action_type: String,
    /// How many actions.
    pub quantity: i64,
}

/// Dry-run response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    /// Whether the action would succeed right now.
    pub allowed: bool,
    /// The quote against current allowance state.
    pub quote: Quote,
    /// Current wallet balance.
    pub balance: i64,
}

/// Check whether a batch of actions could be committed. Mutates nothing:
/// a success here is advisory, the perform endpoint recomputes the quote.
pub async fn check(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Json(body): Json<ActionRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
    let quantity = ensure_quantity(body.quantity)?;
    let rule = state.config.pricing.rule(&body.action_type)?;
    let account = state.store.get_state(&auth.account_id)?;

    let quote = account.quote(rule, quantity);
    let allowed = account.wallet.can_debit(quote.total_cost).is_ok();

    Ok(Json(CheckResponse {
        allowed,
        quote,
        balance: account.wallet.balance,
    }))
}

/// Commit response.
#[derive(Debug, Serialize)]
pub struct PerformResponse {
    /// The quote that was charged.
    pub quote: Quote,
    /// Wallet balance after the commit.
    pub balance_after: i64,
    /// The `spent` ledger entry ID, absent when the free allowance covered
    /// the whole quantity.
    pub entry_id: Option<String>,
}

/// Commit a batch of actions: recompute the quote, consume allowance,
/// debit the wallet, and append the paired ledger entry atomically.
pub async fn perform(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Json(body): Json<ActionRequest>,
) -> Result<Json<PerformResponse>, ApiError> {
    let quantity = ensure_quantity(body.quantity)?;
    let rule = state.config.pricing.rule(&body.action_type)?;

    let receipt = state
        .store
        .commit_action(&auth.account_id, rule, quantity, Utc::now())?;

    tracing::info!(
        account_id = %auth.account_id,
        action_type = %receipt.quote.action_type,
        quantity = %receipt.quote.quantity,
        cost = %receipt.quote.total_cost,
        balance_after = %receipt.balance_after,
        "Action committed"
    );

    Ok(Json(PerformResponse {
        quote: receipt.quote,
        balance_after: receipt.balance_after,
        entry_id: receipt.entry_id.map(|id| id.to_string()),
    }))
}
