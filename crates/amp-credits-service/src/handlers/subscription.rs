//! Subscription lifecycle handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use amp_credits_core::{Subscription, SubscriptionStatus, Tier};

use crate::auth::AuthAccount;
use crate::error::ApiError;
use crate::state::AppState;

/// Subscription response.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// Current tier.
    pub tier: Tier,
    /// Current status.
    pub status: SubscriptionStatus,
    /// Start of the current billing period.
    pub current_period_start: String,
    /// End of the current billing period.
    pub current_period_end: String,
    /// Whether a cancellation takes effect at period end.
    pub cancel_at_period_end: bool,
    /// Downgrade tier taking effect at period end, if any.
    pub pending_tier: Option<Tier>,
    /// Monthly credits granted at this tier.
    pub monthly_credits: i64,
    /// Top-up discount at this tier, percent.
    pub topup_discount_percent: u8,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(sub: &Subscription) -> Self {
        Self {
            tier: sub.tier,
            status: sub.status,
            current_period_start: sub.current_period_start.to_rfc3339(),
            current_period_end: sub.current_period_end.to_rfc3339(),
            cancel_at_period_end: sub.cancel_at_period_end,
            pending_tier: sub.pending_tier,
            monthly_credits: sub.tier.monthly_credits(),
            topup_discount_percent: sub.tier.topup_discount_percent(),
        }
    }
}

/// Get the current subscription.
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let account = state.store.get_state(&auth.account_id)?;

    Ok(Json(SubscriptionResponse::from(&account.subscription)))
}

/// Tier change request.
#[derive(Debug, Deserialize)]
pub struct TierChangeRequest {
    /// The target tier.
    pub tier: Tier,
}

/// Upgrade response.
#[derive(Debug, Serialize)]
pub struct UpgradeResponse {
    /// The subscription after the upgrade.
    #[serde(flatten)]
    pub subscription: SubscriptionResponse,
    /// Prorated credits granted for the cycle remainder.
    pub granted_credits: i64,
    /// Wallet balance after the grant.
    pub balance: i64,
}

/// Upgrade to a higher tier immediately. The credit difference between the
/// tiers is granted, prorated over the remainder of the current period.
pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Json(body): Json<TierChangeRequest>,
) -> Result<Json<UpgradeResponse>, ApiError> {
    let outcome = state
        .store
        .upgrade_subscription(&auth.account_id, body.tier, Utc::now())?;

    tracing::info!(
        account_id = %auth.account_id,
        tier = ?outcome.tier,
        granted_credits = %outcome.granted_credits,
        "Subscription upgraded"
    );

    let account = state.store.get_state(&auth.account_id)?;
    Ok(Json(UpgradeResponse {
        subscription: SubscriptionResponse::from(&account.subscription),
        granted_credits: outcome.granted_credits,
        balance: outcome.balance,
    }))
}

/// Schedule a downgrade to a lower tier, effective at period end. Already
/// granted credits are kept.
pub async fn downgrade(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Json(body): Json<TierChangeRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = state.store.schedule_downgrade(&auth.account_id, body.tier)?;

    tracing::info!(
        account_id = %auth.account_id,
        pending_tier = ?body.tier,
        "Subscription downgrade scheduled"
    );

    Ok(Json(SubscriptionResponse::from(&subscription)))
}

/// Cancellation request.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// Cancel at period end (default) or immediately.
    #[serde(default = "default_at_period_end")]
    pub at_period_end: bool,
}

fn default_at_period_end() -> bool {
    true
}

/// Cancel the subscription.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Json(body): Json<CancelRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = state
        .store
        .cancel_subscription(&auth.account_id, body.at_period_end)?;

    tracing::info!(
        account_id = %auth.account_id,
        at_period_end = %body.at_period_end,
        "Subscription cancelled"
    );

    Ok(Json(SubscriptionResponse::from(&subscription)))
}
