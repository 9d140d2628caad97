//! Wallet state for one account.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CreditError, Result};
use crate::ledger::TransactionType;
use crate::AccountId;

/// Per-account balance and lock state; the single source of truth for
/// "can this be spent".
///
/// The balance never goes negative: a debit that would overdraw is
/// rejected, not clamped. Wallets are created when the account is
/// provisioned and archived with it, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// The owning account.
    pub account_id: AccountId,

    /// Current balance in whole credits. Never negative.
    pub balance: i64,

    /// When true, all debits are suspended. Credits still apply.
    pub is_locked: bool,

    /// Archived wallets accept no mutation at all.
    pub is_archived: bool,

    /// Start of the current billing cycle.
    pub cycle_start: DateTime<Utc>,

    /// End of the current billing cycle; the next allowance reset date.
    pub cycle_end: DateTime<Utc>,

    /// Lifetime credits granted by subscriptions (plan bucket).
    pub lifetime_plan_credits: i64,

    /// Lifetime credits bought through top-up packages (purchased bucket).
    pub lifetime_purchased_credits: i64,

    /// Lifetime promotional credits (bonus bucket).
    pub lifetime_bonus_credits: i64,

    /// Lifetime refunded credits.
    pub lifetime_refunded_credits: i64,

    /// Lifetime credits spent or expired.
    pub lifetime_spent_credits: i64,

    /// When the wallet was created.
    pub created_at: DateTime<Utc>,

    /// When the wallet was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new wallet with zero balance and a one-month billing cycle
    /// starting at `now`.
    #[must_use]
    pub fn new(account_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            balance: 0,
            is_locked: false,
            is_archived: false,
            cycle_start: now,
            cycle_end: next_cycle_end(now),
            lifetime_plan_credits: 0,
            lifetime_purchased_credits: 0,
            lifetime_bonus_credits: 0,
            lifetime_refunded_credits: 0,
            lifetime_spent_credits: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether a debit of `amount` would be accepted.
    ///
    /// # Errors
    ///
    /// `InsufficientBalance` if the wallet is locked or `amount` exceeds
    /// the balance; `AccountNotFound` if the wallet is archived.
    pub fn can_debit(&self, amount: i64) -> Result<()> {
        self.ensure_active()?;
        if self.is_locked || amount > self.balance {
            return Err(CreditError::InsufficientBalance {
                balance: self.balance,
                required: amount,
            });
        }
        Ok(())
    }

    /// Apply a debit of `amount` (positive) and update the spent bucket.
    ///
    /// Callers must pair this with exactly one `spent` or `expired` ledger
    /// entry carrying the resulting balance.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Wallet::can_debit`].
    pub fn apply_debit(&mut self, amount: i64, now: DateTime<Utc>) -> Result<i64> {
        self.can_debit(amount)?;
        self.balance -= amount;
        self.lifetime_spent_credits += amount;
        self.updated_at = now;
        Ok(self.balance)
    }

    /// Apply a credit of `amount` (positive) of the given type and update
    /// the matching lifetime bucket.
    ///
    /// Callers must pair this with exactly one ledger entry carrying the
    /// resulting balance.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` if `amount` is not positive or `transaction_type` is
    /// a debit type; `AccountNotFound` if the wallet is archived.
    pub fn apply_credit(
        &mut self,
        transaction_type: TransactionType,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.ensure_active()?;
        if amount <= 0 {
            return Err(CreditError::InvalidAmount(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        match transaction_type {
            TransactionType::Earned => self.lifetime_plan_credits += amount,
            TransactionType::Purchased => self.lifetime_purchased_credits += amount,
            TransactionType::Bonus => self.lifetime_bonus_credits += amount,
            TransactionType::Refunded => self.lifetime_refunded_credits += amount,
            TransactionType::Spent | TransactionType::Expired => {
                return Err(CreditError::InvalidAmount(format!(
                    "{transaction_type:?} is not a credit type"
                )));
            }
        }
        self.balance += amount;
        self.updated_at = now;
        Ok(self.balance)
    }

    /// Advance the billing cycle window by one calendar month.
    pub fn advance_cycle(&mut self, now: DateTime<Utc>) {
        self.cycle_start = self.cycle_end;
        self.cycle_end = next_cycle_end(self.cycle_end);
        self.updated_at = now;
    }

    /// Whether the current cycle has ended as of `now`.
    #[must_use]
    pub fn cycle_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.cycle_end
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_archived {
            return Err(CreditError::AccountNotFound {
                account_id: self.account_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Compute the end of a cycle starting at `start`: one calendar month later.
///
/// Falls back to 30 days for dates where month arithmetic overflows the
/// calendar range.
#[must_use]
pub fn next_cycle_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(1))
        .unwrap_or(start + chrono::Duration::days(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_with_balance(balance: i64) -> Wallet {
        let mut wallet = Wallet::new(AccountId::generate(), Utc::now());
        wallet.balance = balance;
        wallet
    }

    #[test]
    fn new_wallet_is_empty_and_unlocked() {
        let wallet = Wallet::new(AccountId::generate(), Utc::now());
        assert_eq!(wallet.balance, 0);
        assert!(!wallet.is_locked);
        assert!(wallet.cycle_end > wallet.cycle_start);
    }

    #[test]
    fn debit_rejects_overdraw() {
        let mut wallet = wallet_with_balance(100);
        let err = wallet.apply_debit(101, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CreditError::InsufficientBalance {
                balance: 100,
                required: 101
            }
        ));
        // Rejected, not clamped.
        assert_eq!(wallet.balance, 100);
    }

    #[test]
    fn debit_exact_balance_succeeds() {
        let mut wallet = wallet_with_balance(100);
        assert_eq!(wallet.apply_debit(100, Utc::now()).unwrap(), 0);
        assert_eq!(wallet.lifetime_spent_credits, 100);
    }

    #[test]
    fn locked_wallet_rejects_debits_but_accepts_credits() {
        let mut wallet = wallet_with_balance(100);
        wallet.is_locked = true;

        assert!(wallet.apply_debit(1, Utc::now()).is_err());
        assert_eq!(
            wallet
                .apply_credit(TransactionType::Bonus, 50, Utc::now())
                .unwrap(),
            150
        );
    }

    #[test]
    fn archived_wallet_rejects_all_mutation() {
        let mut wallet = wallet_with_balance(100);
        wallet.is_archived = true;

        assert!(matches!(
            wallet.apply_debit(1, Utc::now()),
            Err(CreditError::AccountNotFound { .. })
        ));
        assert!(matches!(
            wallet.apply_credit(TransactionType::Earned, 10, Utc::now()),
            Err(CreditError::AccountNotFound { .. })
        ));
    }

    #[test]
    fn credit_updates_matching_bucket() {
        let mut wallet = wallet_with_balance(0);
        let now = Utc::now();
        wallet.apply_credit(TransactionType::Earned, 200, now).unwrap();
        wallet
            .apply_credit(TransactionType::Purchased, 500, now)
            .unwrap();
        wallet.apply_credit(TransactionType::Bonus, 25, now).unwrap();

        assert_eq!(wallet.balance, 725);
        assert_eq!(wallet.lifetime_plan_credits, 200);
        assert_eq!(wallet.lifetime_purchased_credits, 500);
        assert_eq!(wallet.lifetime_bonus_credits, 25);
    }

    #[test]
    fn credit_rejects_debit_types() {
        let mut wallet = wallet_with_balance(0);
        assert!(wallet
            .apply_credit(TransactionType::Spent, 10, Utc::now())
            .is_err());
    }

    #[test]
    fn advance_cycle_moves_window_forward() {
        let mut wallet = Wallet::new(AccountId::generate(), Utc::now());
        let old_end = wallet.cycle_end;
        wallet.advance_cycle(Utc::now());
        assert_eq!(wallet.cycle_start, old_end);
        assert!(wallet.cycle_end > old_end);
    }
}
