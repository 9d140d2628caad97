//! Storage layer for the amp credit ledger.
//!
//! The [`Store`] trait defines every persistence operation the engine
//! needs. Two backends exist:
//!
//! - [`MemoryStore`]: the default in-process backend.
//! - `RocksStore` (feature `rocksdb-backend`): persistent storage using
//!   `RocksDB` column families with CBOR-encoded values.
//!
//! Both backends serialize all mutators for one account behind a
//! per-account mutex and delegate the actual state transitions to
//! [`ops`], so the Wallet/Ledger invariants live in exactly one place.
//! Operations on different accounts proceed in parallel.
//!
//! # Example
//!
//! ```
//! use amp_credits_store::{MemoryStore, Store};
//! use amp_credits_core::{AccountId, PricingTable};
//! use chrono::Utc;
//!
//! let store = MemoryStore::new();
//! let table = PricingTable::default();
//!
//! let account_id = AccountId::generate();
//! store.create_account(account_id, Utc::now()).unwrap();
//!
//! let rule = table.rule("creator_search").unwrap();
//! let receipt = store
//!     .commit_action(&account_id, rule, 3, Utc::now())
//!     .unwrap();
//! assert_eq!(receipt.quote.total_cost, 0); // covered by the allowance
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod ops;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use ops::{AccountState, ActionReceipt, SubscriptionEvent, UpgradeOutcome};
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use amp_credits_core::{
    AccountId, EntryId, LedgerEntry, PricingRule, PricingTable, RolloverSummary, Subscription,
    Tier, TopupPackage, TopupReceipt, TransactionType, Wallet,
};

/// Filter for ledger entry listings.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Only entries with this action type.
    pub action_type: Option<String>,

    /// Only entries created at or after this instant.
    pub from: Option<DateTime<Utc>>,

    /// Only entries created before this instant.
    pub to: Option<DateTime<Utc>>,

    /// Case-insensitive substring match on description or action type.
    pub search: Option<String>,
}

impl EntryFilter {
    /// Whether an entry passes the filter.
    #[must_use]
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(action_type) = &self.action_type {
            if &entry.action_type != action_type {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.created_at >= to {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !entry.description.to_lowercase().contains(&needle)
                && !entry.action_type.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// The storage trait defining all account, ledger, and subscription
/// operations.
///
/// Mutators run under the backend's per-account lock and persist the state
/// change together with its ledger entry atomically; callers never
/// observe one without the other.
pub trait Store: Send + Sync {
    // =========================================================================
    // Accounts
    // =========================================================================

    /// Provision a new account with an empty wallet and a free-tier
    /// subscription.
    ///
    /// # Errors
    ///
    /// `AccountAlreadyExists` if the account was already provisioned.
    fn create_account(&self, account_id: AccountId, now: DateTime<Utc>) -> Result<AccountState>;

    /// Snapshot an account's wallet, subscription, allowances, and
    /// receipts.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account does not exist.
    fn get_state(&self, account_id: &AccountId) -> Result<AccountState>;

    /// Archive an account. The wallet stops accepting all mutation; the
    /// ledger is retained.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account does not exist.
    fn archive_account(&self, account_id: &AccountId, now: DateTime<Utc>) -> Result<()>;

    // =========================================================================
    // Ledger queries
    // =========================================================================

    /// List entries newest first with pagination and filtering.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account does not exist.
    fn list_entries(
        &self,
        account_id: &AccountId,
        filter: &EntryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;

    /// All entries in append order, for replay and summaries.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account does not exist.
    fn all_entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>>;

    // =========================================================================
    // Wallet mutators
    // =========================================================================

    /// Commit a priced action (recomputed quote, allowance consumption,
    /// debit, `spent` entry) as one atomic step.
    ///
    /// # Errors
    ///
    /// `InsufficientBalance` if the wallet is locked or the balance is too
    /// low; `AccountNotFound` if the account is missing or archived.
    fn commit_action(
        &self,
        account_id: &AccountId,
        rule: &PricingRule,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<ActionReceipt>;

    /// Credit the wallet (bonus, refund, grant) with its paired entry.
    /// Returns the new balance and the entry ID.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for non-positive amounts; `AccountNotFound` if the
    /// account is missing or archived.
    fn grant_credit(
        &self,
        account_id: &AccountId,
        transaction_type: TransactionType,
        action_type: &str,
        amount: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<(i64, EntryId)>;

    /// Lock or unlock the wallet. Returns the updated wallet.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account is missing or archived.
    fn set_wallet_lock(
        &self,
        account_id: &AccountId,
        locked: bool,
        now: DateTime<Utc>,
    ) -> Result<Wallet>;

    // =========================================================================
    // Top-ups
    // =========================================================================

    /// Apply a confirmed purchase, idempotent on `external_reference`.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account is missing or archived.
    fn confirm_topup(
        &self,
        account_id: &AccountId,
        package: &TopupPackage,
        external_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<TopupReceipt>;

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Roll the billing cycle over; duplicate triggers report
    /// `applied: false`.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account is missing or archived.
    fn rollover(
        &self,
        account_id: &AccountId,
        table: &PricingTable,
        now: DateTime<Utc>,
    ) -> Result<RolloverSummary>;

    /// Upgrade the tier immediately with a prorated grant.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` for invalid transitions;
    /// `AccountNotFound` if the account is missing or archived.
    fn upgrade_subscription(
        &self,
        account_id: &AccountId,
        new_tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<UpgradeOutcome>;

    /// Record a downgrade, effective at period end.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` for invalid transitions;
    /// `AccountNotFound` if the account does not exist.
    fn schedule_downgrade(&self, account_id: &AccountId, new_tier: Tier) -> Result<Subscription>;

    /// Cancel the subscription, immediately or at period end.
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` if already cancelled; `AccountNotFound`
    /// if the account does not exist.
    fn cancel_subscription(
        &self,
        account_id: &AccountId,
        at_period_end: bool,
    ) -> Result<Subscription>;

    /// Apply a processor-reported lifecycle event (payment failed or
    /// recovered, trial converted).
    ///
    /// # Errors
    ///
    /// `SubscriptionStateConflict` for invalid transitions;
    /// `AccountNotFound` if the account does not exist.
    fn apply_subscription_event(
        &self,
        account_id: &AccountId,
        event: SubscriptionEvent,
    ) -> Result<Subscription>;
}
