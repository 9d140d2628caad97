//! Top-up package handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use amp_credits_core::{PricedPackage, TopupPackage};

use crate::auth::AuthAccount;
use crate::error::ApiError;
use crate::state::AppState;

/// Top-up package listing, priced for the caller's tier.
#[derive(Debug, Serialize)]
pub struct PackagesResponse {
    /// The caller's top-up discount, percent.
    pub discount_percentage: u8,
    /// Available packages with tier-discounted prices.
    pub packages: Vec<PricedPackage>,
}

/// List the available top-up packages with the caller's tier discount
/// applied. Purchase itself runs through the payment processor; the
/// confirmation webhook credits the wallet.
pub async fn list_packages(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> Result<Json<PackagesResponse>, ApiError> {
    let account = state.store.get_state(&auth.account_id)?;
    let tier = account.subscription.tier;

    let packages: Vec<_> = TopupPackage::catalog()
        .iter()
        .map(|p| p.priced_for(tier))
        .collect();

    Ok(Json(PackagesResponse {
        discount_percentage: tier.topup_discount_percent(),
        packages,
    }))
}
