//! Pricing table and cost calculation handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use amp_credits_core::{ensure_quantity, BulkDiscount, PricingRule, Quote};

use crate::auth::AuthAccount;
use crate::error::ApiError;
use crate::state::AppState;

/// One pricing rule in an API response.
#[derive(Debug, Serialize)]
pub struct RuleResponse {
    /// The action type.
    pub action_type: String,
    /// Cost per action in credits, before discounts.
    pub credits_per_action: i64,
    /// Free actions per calendar month.
    pub free_allowance_per_month: u32,
    /// Bulk discount tiers, ascending by threshold.
    pub bulk_discounts: Vec<BulkDiscount>,
}

impl From<&PricingRule> for RuleResponse {
    fn from(rule: &PricingRule) -> Self {
        Self {
            action_type: rule.action_type.clone(),
            credits_per_action: rule.credits_per_action,
            free_allowance_per_month: rule.free_allowance_per_month,
            bulk_discounts: rule.bulk_discounts.clone(),
        }
    }
}

/// Pricing table response.
#[derive(Debug, Serialize)]
pub struct PricingTableResponse {
    /// All pricing rules, by action type.
    pub rules: Vec<RuleResponse>,
}

/// Get the full pricing table.
pub async fn pricing_table(State(state): State<Arc<AppState>>) -> Json<PricingTableResponse> {
    let rules = state
        .config
        .pricing
        .action_types()
        .filter_map(|action_type| state.config.pricing.rule(action_type).ok())
        .map(RuleResponse::from)
        .collect();

    Json(PricingTableResponse { rules })
}

/// Get the pricing rule for one action type.
pub async fn pricing_rule(
    State(state): State<Arc<AppState>>,
    Path(action_type): Path<String>,
) -> Result<Json<RuleResponse>, ApiError> {
    let rule = state.config.pricing.rule(&action_type)?;

    Ok(Json(RuleResponse::from(rule)))
}

/// Cost calculation request.
#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    /// The action type to price.
    pub action_type: String,
    /// Requested quantity.
    pub quantity: i64,
}

/// Compute the cost of a batch of actions against the caller's current
/// allowance state. Pure calculation; nothing is charged or consumed.
pub async fn calculate(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Json(body): Json<CalculateRequest>,
) -> Result<Json<Quote>, ApiError> {
    let quantity = ensure_quantity(body.quantity)?;
    let rule = state.config.pricing.rule(&body.action_type)?;
    let account = state.store.get_state(&auth.account_id)?;

    Ok(Json(account.quote(rule, quantity)))
}
