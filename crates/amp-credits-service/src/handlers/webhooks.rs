//! Payment-processor webhook handlers.
//!
//! The processor reports top-up confirmations and subscription lifecycle
//! changes here. Bodies are HMAC-signed when a webhook secret is
//! configured; top-up confirmations are idempotent on the processor's
//! payment reference.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use amp_credits_core::{AccountId, PackageType, TopupPackage};
use amp_credits_store::SubscriptionEvent;

use crate::crypto;
use crate::error::ApiError;
use crate::state::AppState;

/// Payment webhook payload.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The account the event concerns.
    pub account_id: String,
    /// Processor payment reference (required for top-up confirmations).
    #[serde(default)]
    pub external_reference: Option<String>,
    /// Purchased package (required for top-up confirmations).
    #[serde(default)]
    pub package_type: Option<PackageType>,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle payment-processor webhooks.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    // Verify signature if a webhook secret is configured
    if let Some(secret) = &state.config.payment_webhook_secret {
        let signature = headers
            .get("x-amp-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing webhook signature".into()))?;

        if !crypto::verify_signature(secret, &body, signature) {
            tracing::warn!("Invalid payment webhook signature");
            return Err(ApiError::BadRequest("Invalid webhook signature".into()));
        }
    } else {
        // No secret configured - skip verification (development mode)
        tracing::warn!("Payment webhook secret not configured - skipping signature verification");
    }

    // Parse webhook payload
    let webhook: PaymentWebhook =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let account_id: AccountId = webhook
        .account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))?;

    tracing::info!(
        event_type = %webhook.event_type,
        account_id = %account_id,
        "Received payment webhook"
    );

    match webhook.event_type.as_str() {
        "topup.confirmed" => {
            handle_topup_confirmed(&state, account_id, &webhook)?;
        }
        "subscription.payment_failed" => {
            state
                .store
                .apply_subscription_event(&account_id, SubscriptionEvent::PaymentFailed)?;
            tracing::info!(account_id = %account_id, "Subscription marked past due");
        }
        "subscription.payment_recovered" => {
            state
                .store
                .apply_subscription_event(&account_id, SubscriptionEvent::PaymentRecovered)?;
            tracing::info!(account_id = %account_id, "Subscription payment recovered");
        }
        "subscription.trial_converted" => {
            state
                .store
                .apply_subscription_event(&account_id, SubscriptionEvent::TrialConverted)?;
            tracing::info!(account_id = %account_id, "Trial converted to active");
        }
        _ => {
            tracing::debug!(event_type = %webhook.event_type, "Unhandled payment event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

fn handle_topup_confirmed(
    state: &AppState,
    account_id: AccountId,
    webhook: &PaymentWebhook,
) -> Result<(), ApiError> {
    let package_type = webhook
        .package_type
        .ok_or_else(|| ApiError::BadRequest("Missing package_type".into()))?;
    let external_reference = webhook
        .external_reference
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing external_reference".into()))?;

    let package = TopupPackage::by_type(package_type);
    let receipt = state
        .store
        .confirm_topup(&account_id, &package, external_reference, Utc::now())?;

    tracing::info!(
        account_id = %account_id,
        external_reference = %receipt.external_reference,
        credits = %receipt.credits,
        balance_after = %receipt.balance_after,
        "Top-up applied"
    );

    Ok(())
}
