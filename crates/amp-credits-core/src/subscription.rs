//! Subscription tiers, status machine, and cycle rollover accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CreditError, Result};
use crate::wallet::next_cycle_end;

// ============================================================================
// Constants
// ============================================================================

/// Standard tier monthly price in cents ($49).
pub const STANDARD_MONTHLY_PRICE_CENTS: i64 = 4900;

/// Premium tier monthly price in cents ($149).
pub const PREMIUM_MONTHLY_PRICE_CENTS: i64 = 14900;

/// Standard tier monthly credit grant.
pub const STANDARD_MONTHLY_CREDITS: i64 = 500;

/// Premium tier monthly credit grant.
pub const PREMIUM_MONTHLY_CREDITS: i64 = 2000;

/// Standard tier discount on top-up packages.
pub const STANDARD_TOPUP_DISCOUNT_PERCENT: u8 = 10;

/// Premium tier discount on top-up packages.
pub const PREMIUM_TOPUP_DISCOUNT_PERCENT: u8 = 20;

/// Subscription tiers, ordered so that upgrades move strictly upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Free tier: no monthly grant, no top-up discount.
    Free,

    /// Standard tier: 500 credits/month, 10% top-up discount.
    Standard,

    /// Premium tier: 2000 credits/month, 20% top-up discount.
    Premium,
}

impl Tier {
    /// Monthly credit grant for this tier.
    #[must_use]
    pub const fn monthly_credits(self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Standard => STANDARD_MONTHLY_CREDITS,
            Self::Premium => PREMIUM_MONTHLY_CREDITS,
        }
    }

    /// Discount percentage on top-up packages. Monotonic in tier.
    #[must_use]
    pub const fn topup_discount_percent(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Standard => STANDARD_TOPUP_DISCOUNT_PERCENT,
            Self::Premium => PREMIUM_TOPUP_DISCOUNT_PERCENT,
        }
    }

    /// Monthly price in cents.
    #[must_use]
    pub const fn monthly_price_cents(self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Standard => STANDARD_MONTHLY_PRICE_CENTS,
            Self::Premium => PREMIUM_MONTHLY_PRICE_CENTS,
        }
    }
}

/// Status of a subscription.
///
/// Transitions: `trialing → active`, `active → past_due`,
/// `past_due → active`, `active/past_due → cancelled`. `cancelled` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// In trial; converts to active when payment is confirmed.
    Trialing,

    /// Active and entitled to the tier's grants.
    Active,

    /// A payment failed; entitlements continue until cancellation.
    PastDue,

    /// Terminal. Soft-ended, never deleted.
    Cancelled,
}

/// The subscription attached to one account. At most one per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Current tier.
    pub tier: Tier,

    /// Current status.
    pub status: SubscriptionStatus,

    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,

    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,

    /// Cancellation recorded now, effective at period end.
    pub cancel_at_period_end: bool,

    /// Downgrade recorded now, effective at period end.
    pub pending_tier: Option<Tier>,

    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// A new free-tier subscription starting at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            tier: Tier::Free,
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: next_cycle_end(now),
            cancel_at_period_end: false,
            pending_tier: None,
            created_at: now,
        }
    }

    /// Whether the account currently holds the tier's entitlements.
    #[must_use]
    pub fn is_entitled(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }

    /// Upgrade to a higher tier, effective immediately. Returns the
    /// prorated credit grant for the remainder of the current cycle.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` if the subscription is cancelled or
    /// `new_tier` is not strictly higher than the current tier.
    pub fn upgrade(&mut self, new_tier: Tier, now: DateTime<Utc>) -> Result<i64> {
        if self.status == SubscriptionStatus::Cancelled {
            return Err(CreditError::SubscriptionStateConflict(
                "cannot upgrade a cancelled subscription".into(),
            ));
        }
        if new_tier <= self.tier {
            return Err(CreditError::SubscriptionStateConflict(format!(
                "upgrade target {new_tier:?} is not above current tier {:?}",
                self.tier
            )));
        }

        let grant = prorate(
            new_tier.monthly_credits() - self.tier.monthly_credits(),
            self.current_period_start,
            self.current_period_end,
            now,
        );
        self.tier = new_tier;
        // An explicit upgrade supersedes any scheduled downgrade or
        // cancellation.
        self.pending_tier = None;
        self.cancel_at_period_end = false;
        Ok(grant)
    }

    /// Record a downgrade, effective at period end. Current-tier
    /// entitlements are kept until then.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` if cancelled or `new_tier` is not
    /// strictly lower than the current tier.
    pub fn schedule_downgrade(&mut self, new_tier: Tier) -> Result<()> {
        if self.status == SubscriptionStatus::Cancelled {
            return Err(CreditError::SubscriptionStateConflict(
                "cannot downgrade a cancelled subscription".into(),
            ));
        }
        if new_tier >= self.tier {
            return Err(CreditError::SubscriptionStateConflict(format!(
                "downgrade target {new_tier:?} is not below current tier {:?}",
                self.tier
            )));
        }
        self.pending_tier = Some(new_tier);
        Ok(())
    }

    /// Cancel the subscription. With `at_period_end` the cancellation is
    /// recorded now and applied at rollover; otherwise the status turns
    /// `cancelled` immediately.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` if already cancelled.
    pub fn cancel(&mut self, at_period_end: bool) -> Result<()> {
        if self.status == SubscriptionStatus::Cancelled {
            return Err(CreditError::SubscriptionStateConflict(
                "subscription is already cancelled".into(),
            ));
        }
        if at_period_end {
            self.cancel_at_period_end = true;
        } else {
            self.status = SubscriptionStatus::Cancelled;
        }
        Ok(())
    }

    /// Payment failure reported by the processor: `active → past_due`.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` unless currently active.
    pub fn mark_past_due(&mut self) -> Result<()> {
        if self.status != SubscriptionStatus::Active {
            return Err(CreditError::SubscriptionStateConflict(format!(
                "payment failure reported while {:?}",
                self.status
            )));
        }
        self.status = SubscriptionStatus::PastDue;
        Ok(())
    }

    /// Payment recovered: `past_due → active`.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` unless currently past due.
    pub fn mark_recovered(&mut self) -> Result<()> {
        if self.status != SubscriptionStatus::PastDue {
            return Err(CreditError::SubscriptionStateConflict(format!(
                "payment recovery reported while {:?}",
                self.status
            )));
        }
        self.status = SubscriptionStatus::Active;
        Ok(())
    }

    /// Trial ended with payment confirmed: `trialing → active`.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` unless currently trialing.
    pub fn activate_from_trial(&mut self) -> Result<()> {
        if self.status != SubscriptionStatus::Trialing {
            return Err(CreditError::SubscriptionStateConflict(format!(
                "trial conversion reported while {:?}",
                self.status
            )));
        }
        self.status = SubscriptionStatus::Active;
        Ok(())
    }

    /// Advance the period by one calendar month and apply any pending
    /// downgrade or cancellation. Returns the monthly grant owed for the
    /// new period (zero unless the subscription is active afterwards).
    pub fn apply_rollover(&mut self) -> i64 {
        self.current_period_start = self.current_period_end;
        self.current_period_end = next_cycle_end(self.current_period_end);

        if self.cancel_at_period_end {
            self.status = SubscriptionStatus::Cancelled;
            self.cancel_at_period_end = false;
        }
        if let Some(tier) = self.pending_tier.take() {
            self.tier = tier;
        }

        if self.status == SubscriptionStatus::Active {
            self.tier.monthly_credits()
        } else {
            0
        }
    }
}

/// Outcome of one cycle rollover for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverSummary {
    /// False when the trigger was a duplicate for the current cycle.
    pub applied: bool,

    /// Start of the cycle after the rollover.
    pub cycle_start: DateTime<Utc>,

    /// End of the cycle after the rollover.
    pub cycle_end: DateTime<Utc>,

    /// Monthly credits granted into the wallet.
    pub granted_credits: i64,

    /// Tier in effect after the rollover.
    pub tier: Tier,

    /// Status in effect after the rollover.
    pub status: SubscriptionStatus,
}

/// Prorate `monthly_amount` over the remainder of the period, rounding
/// half-up. Negative or elapsed remainders prorate to zero.
#[must_use]
pub fn prorate(
    monthly_amount: i64,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    let total = (period_end - period_start).num_seconds();
    let remaining = (period_end - now).num_seconds().clamp(0, total.max(0));
    if monthly_amount <= 0 || total <= 0 {
        return 0;
    }
    (monthly_amount * remaining + total / 2) / total
}
