//! API handlers.

pub mod accounts;
pub mod actions;
pub mod admin;
pub mod health;
pub mod pricing;
pub mod subscription;
pub mod topup;
pub mod wallet;
pub mod webhooks;
