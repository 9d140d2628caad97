//! Top-up packages and purchase receipts.
//!
//! Packages are ephemeral price quotes until the external payment
//! processor confirms the purchase; confirmation produces a `purchased`
//! ledger entry and a persisted [`TopupReceipt`] keyed by the processor's
//! reference, which makes webhook replays harmless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EntryId, Tier};

/// The available one-time credit packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    /// Entry package.
    Starter,

    /// Mid-size package.
    Professional,

    /// Largest package.
    Enterprise,
}

impl PackageType {
    /// All package types, smallest first.
    pub const ALL: [Self; 3] = [Self::Starter, Self::Professional, Self::Enterprise];

    /// Ledger `action_type` tag for purchases of this package.
    #[must_use]
    pub const fn action_tag(self) -> &'static str {
        match self {
            Self::Starter => "topup_starter",
            Self::Professional => "topup_professional",
            Self::Enterprise => "topup_enterprise",
        }
    }
}

/// Base definition of a top-up package, before tier discounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupPackage {
    /// Which package.
    pub package_type: PackageType,

    /// Credits delivered on confirmation.
    pub credits: i64,

    /// List price in cents, before tier discount.
    pub base_price_cents: i64,
}

impl TopupPackage {
    /// The package catalog.
    #[must_use]
    pub fn catalog() -> Vec<Self> {
        vec![
            Self {
                package_type: PackageType::Starter,
                credits: 500,
                base_price_cents: 4900,
            },
            Self {
                package_type: PackageType::Professional,
                credits: 1500,
                base_price_cents: 12900,
            },
            Self {
                package_type: PackageType::Enterprise,
                credits: 5000,
                base_price_cents: 39900,
            },
        ]
    }

    /// Look up a package by type.
    #[must_use]
    pub fn by_type(package_type: PackageType) -> Self {
        Self::catalog()
            .into_iter()
            .find(|p| p.package_type == package_type)
            .unwrap_or_else(|| unreachable!("catalog covers every package type"))
    }

    /// Price this package for a subscription tier.
    #[must_use]
    pub fn priced_for(&self, tier: Tier) -> PricedPackage {
        let discount_percentage = tier.topup_discount_percent();
        let discounted_price_cents = (self.base_price_cents
            * i64::from(100 - u16::from(discount_percentage))
            + 50)
            / 100;
        PricedPackage {
            package_type: self.package_type,
            credits: self.credits,
            base_price_cents: self.base_price_cents,
            discount_percentage,
            discounted_price_cents,
        }
    }
}

/// A package with the tier discount applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedPackage {
    /// Which package.
    pub package_type: PackageType,

    /// Credits delivered on confirmation.
    pub credits: i64,

    /// List price in cents.
    pub base_price_cents: i64,

    /// Tier discount percentage.
    pub discount_percentage: u8,

    /// Price after discount, in cents, rounded half-up.
    pub discounted_price_cents: i64,
}

/// The persisted outcome of a confirmed purchase.
///
/// Stored under the processor's `external_reference`; a replayed
/// confirmation returns this original receipt instead of crediting again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupReceipt {
    /// The account credited.
    pub account_id: AccountId,

    /// The payment processor's idempotency reference.
    pub external_reference: String,

    /// The package purchased.
    pub package_type: PackageType,

    /// Credits delivered.
    pub credits: i64,

    /// The `purchased` ledger entry recording the credit.
    pub entry_id: EntryId,

    /// Balance after the credit applied.
    pub balance_after: i64,

    /// When the confirmation was first applied.
    pub confirmed_at: DateTime<Utc>,
}
