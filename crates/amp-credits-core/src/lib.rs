//! Core types and logic for the amp credit ledger.
//!
//! This crate provides the invariant-bearing domain model behind the amp
//! platform's consumption-based pricing:
//!
//! - **Identifiers**: `AccountId`, `EntryId`
//! - **Wallet**: per-account balance, lock state, and billing-cycle window
//! - **Ledger**: `LedgerEntry`, `TransactionType` (append-only audit trail)
//! - **Pricing**: `PricingTable`, `PricingRule`, `BulkDiscount`, `Quote`
//! - **Allowance**: `AllowanceState` (monthly free quota per action type)
//! - **Subscription**: `Subscription`, `Tier`, `SubscriptionStatus`
//! - **Top-ups**: `TopupPackage`, `PricedPackage`, `TopupReceipt`
//! - **Summary**: ledger replay, in/out totals, monthly breakdowns
//!
//! # Credit unit
//!
//! All amounts are whole credits stored as `i64`. Fractional credits are
//! never persisted and never cross an API boundary; pricing math rounds
//! half-up to the nearest whole credit.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod allowance;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod pricing;
pub mod subscription;
pub mod summary;
pub mod topup;
pub mod wallet;

pub use allowance::AllowanceState;
pub use error::{CreditError, Result};
pub use ids::{AccountId, EntryId, IdError};
pub use ledger::{LedgerEntry, TransactionType};
pub use pricing::{ensure_quantity, BulkDiscount, PricingRule, PricingTable, Quote};
pub use subscription::{
    RolloverSummary, Subscription, SubscriptionStatus, Tier, PREMIUM_MONTHLY_CREDITS,
    PREMIUM_MONTHLY_PRICE_CENTS, PREMIUM_TOPUP_DISCOUNT_PERCENT, STANDARD_MONTHLY_CREDITS,
    STANDARD_MONTHLY_PRICE_CENTS, STANDARD_TOPUP_DISCOUNT_PERCENT,
};
pub use summary::{InOutSummary, MonthlyBreakdown, SpendingByAction};
pub use topup::{PackageType, PricedPackage, TopupPackage, TopupReceipt};
pub use wallet::Wallet;
