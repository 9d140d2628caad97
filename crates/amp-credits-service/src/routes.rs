//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    accounts, actions, admin, health, pricing, subscription, topup, wallet, webhooks,
};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts (bearer auth)
/// - `POST /v1/accounts` - Provision account
/// - `GET /v1/accounts/me` - Get current account
/// - `DELETE /v1/accounts/me` - Archive current account
///
/// ## Wallet (bearer auth)
/// - `GET /v1/wallet` - Wallet summary with allowances
/// - `GET /v1/wallet/transactions` - Paged, filterable ledger history
/// - `GET /v1/wallet/summary` - Credits in/out with monthly breakdown
/// - `GET /v1/wallet/analytics` - Spending by action over N months
///
/// ## Pricing and actions (bearer auth)
/// - `GET /v1/pricing` - Full pricing table
/// - `GET /v1/pricing/:action_type` - Single rule
/// - `POST /v1/pricing/calculate` - Pure cost calculation
/// - `POST /v1/actions/check` - Dry-run affordability check
/// - `POST /v1/actions/perform` - Commit a batch of actions
///
/// ## Subscription and top-ups (bearer auth)
/// - `GET /v1/subscription` - Current subscription
/// - `POST /v1/subscription/upgrade` - Immediate upgrade with prorated grant
/// - `POST /v1/subscription/downgrade` - Downgrade at period end
/// - `POST /v1/subscription/cancel` - Cancel now or at period end
/// - `GET /v1/topup/packages` - Packages priced for the caller's tier
///
/// ## Operations (service API key auth)
/// - `POST /v1/service/rollover` - Trigger cycle rollover
/// - `POST /v1/service/wallet-lock` - Lock or unlock a wallet
/// - `POST /v1/service/credits/grant` - Grant bonus/refund credits
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/payment` - Payment-processor events
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Accounts
        .route("/v1/accounts", post(accounts::create_account))
        .route("/v1/accounts/me", get(accounts::get_account))
        .route("/v1/accounts/me", delete(accounts::archive_account))
        // Wallet
        .route("/v1/wallet", get(wallet::wallet_summary))
        .route("/v1/wallet/transactions", get(wallet::list_transactions))
        .route("/v1/wallet/summary", get(wallet::in_out_summary))
        .route("/v1/wallet/analytics", get(wallet::spending_analytics))
        // Pricing
        .route("/v1/pricing", get(pricing::pricing_table))
        .route("/v1/pricing/:action_type", get(pricing::pricing_rule))
        .route("/v1/pricing/calculate", post(pricing::calculate))
        // Actions
        .route("/v1/actions/check", post(actions::check))
        .route("/v1/actions/perform", post(actions::perform))
        // Subscription
        .route("/v1/subscription", get(subscription::get_subscription))
        .route("/v1/subscription/upgrade", post(subscription::upgrade))
        .route("/v1/subscription/downgrade", post(subscription::downgrade))
        .route("/v1/subscription/cancel", post(subscription::cancel))
        // Top-ups
        .route("/v1/topup/packages", get(topup::list_packages))
        // Operations (service auth)
        .route("/v1/service/rollover", post(admin::rollover))
        .route("/v1/service/wallet-lock", post(admin::set_wallet_lock))
        .route("/v1/service/credits/grant", post(admin::grant_credits))
        // Webhooks
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
