//! Amp Credits HTTP API Service.
//!
//! This crate exposes the credit ledger over HTTP:
//!
//! - Account provisioning and wallet summaries
//! - Quote/commit of priced actions with monthly free allowances
//! - Transaction history, in/out summaries, and spending analytics
//! - Subscription upgrade/downgrade/cancel and cycle rollover
//! - Top-up packages and payment-processor webhooks
//!
//! # Authentication
//!
//! Two authentication methods are supported:
//!
//! 1. **Bearer tokens** - For end-user requests (the campaign dashboard)
//! 2. **Service API keys** - For service-to-service requests (billing jobs,
//!    payment-processor glue)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers need async only for routing consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
