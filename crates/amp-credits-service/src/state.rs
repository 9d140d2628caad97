//! Application state.

use std::sync::Arc;

use amp_credits_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        if config.service_api_key.is_none() {
            tracing::warn!("Service API key not configured - service endpoints will reject all requests");
        }
        if config.payment_webhook_secret.is_none() {
            tracing::warn!("Payment webhook secret not configured - signature verification disabled");
        }

        Self { store, config }
    }
}
