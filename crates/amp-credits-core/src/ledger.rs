//! Ledger entry types for the amp credit ledger.
//!
//! Every wallet mutation produces exactly one ledger entry; the ledger is
//! the only audit trail for balance changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EntryId};

/// An append-only record of one balance change.
///
/// Invariant: `balance_after` of entry *n* equals `balance_after` of entry
/// *n−1* plus `amount` of entry *n*; replaying all amounts from zero yields
/// the current wallet balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: EntryId,

    /// The account whose balance changed.
    pub account_id: AccountId,

    /// Type of transaction.
    pub transaction_type: TransactionType,

    /// The feature consumed or the source of the credit
    /// (e.g. `creator_search`, `monthly_grant`, `topup_professional`).
    pub action_type: String,

    /// Signed amount in credits. Negative for spent/expired,
    /// positive otherwise.
    pub amount: i64,

    /// Wallet balance immediately after this entry.
    pub balance_after: i64,

    /// Human-readable description.
    pub description: String,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(
        account_id: AccountId,
        transaction_type: TransactionType,
        action_type: impl Into<String>,
        amount: i64,
        balance_after: i64,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            account_id,
            transaction_type,
            action_type: action_type.into(),
            amount,
            balance_after,
            description: description.into(),
            created_at,
        }
    }

    /// Create a `spent` entry for a committed action. `cost` is the positive
    /// charge; the stored amount is negative.
    #[must_use]
    pub fn spent(
        account_id: AccountId,
        action_type: &str,
        cost: i64,
        balance_after: i64,
        description: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Spent,
            action_type,
            -cost.abs(),
            balance_after,
            description,
            at,
        )
    }

    /// Create an `earned` entry (monthly grant, prorated upgrade grant).
    #[must_use]
    pub fn earned(
        account_id: AccountId,
        action_type: &str,
        amount: i64,
        balance_after: i64,
        description: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Earned,
            action_type,
            amount,
            balance_after,
            description,
            at,
        )
    }

    /// Create a `purchased` entry for a confirmed top-up.
    #[must_use]
    pub fn purchased(
        account_id: AccountId,
        action_type: &str,
        amount: i64,
        balance_after: i64,
        description: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Purchased,
            action_type,
            amount,
            balance_after,
            description,
            at,
        )
    }

    /// Create a `bonus` entry (promotional credits).
    #[must_use]
    pub fn bonus(
        account_id: AccountId,
        amount: i64,
        balance_after: i64,
        reason: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Bonus,
            "bonus",
            amount,
            balance_after,
            reason,
            at,
        )
    }

    /// Create a `refunded` entry.
    #[must_use]
    pub fn refunded(
        account_id: AccountId,
        action_type: &str,
        amount: i64,
        balance_after: i64,
        reason: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Refunded,
            action_type,
            amount,
            balance_after,
            reason,
            at,
        )
    }

    /// Create an `expired` entry. `amount` is the positive number of credits
    /// removed; the stored amount is negative.
    #[must_use]
    pub fn expired(
        account_id: AccountId,
        amount: i64,
        balance_after: i64,
        reason: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Expired,
            "expiry",
            -amount.abs(),
            balance_after,
            reason,
            at,
        )
    }
}

/// Type of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits deducted for a performed action.
    Spent,

    /// Credits granted by the subscription (monthly grant, proration).
    Earned,

    /// Credits bought through a top-up package.
    Purchased,

    /// Promotional or goodwill credits.
    Bonus,

    /// Refund issued.
    Refunded,

    /// Credits removed at expiry.
    Expired,
}

impl TransactionType {
    /// Whether this type adds credits (counts toward `credits_in`).
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(
            self,
            Self::Earned | Self::Purchased | Self::Bonus | Self::Refunded
        )
    }

    /// Whether this type removes credits (counts toward `credits_out`).
    #[must_use]
    pub const fn is_debit(self) -> bool {
        matches!(self, Self::Spent | Self::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spent_entry_is_negative() {
        let account_id = AccountId::generate();
        let entry = LedgerEntry::spent(
            account_id,
            "creator_search",
            6,
            94,
            "creator_search x8".into(),
            Utc::now(),
        );

        assert_eq!(entry.amount, -6);
        assert_eq!(entry.balance_after, 94);
        assert_eq!(entry.transaction_type, TransactionType::Spent);
    }

    #[test]
    fn expired_entry_is_negative() {
        let account_id = AccountId::generate();
        let entry = LedgerEntry::expired(account_id, 25, 75, "cycle expiry".into(), Utc::now());
        assert_eq!(entry.amount, -25);
        assert!(entry.transaction_type.is_debit());
    }

    #[test]
    fn purchased_entry_is_positive() {
        let account_id = AccountId::generate();
        let entry = LedgerEntry::purchased(
            account_id,
            "topup_professional",
            1500,
            1600,
            "Professional top-up".into(),
            Utc::now(),
        );
        assert_eq!(entry.amount, 1500);
        assert!(entry.transaction_type.is_credit());
    }

    #[test]
    fn transaction_type_in_out_partition() {
        for t in [
            TransactionType::Spent,
            TransactionType::Earned,
            TransactionType::Purchased,
            TransactionType::Bonus,
            TransactionType::Refunded,
            TransactionType::Expired,
        ] {
            assert!(t.is_credit() != t.is_debit());
        }
    }
}
