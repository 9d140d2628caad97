//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait. Account state lives in one column family as a CBOR blob; ledger
//! entries live in another, keyed `account_id || entry_id` so a prefix
//! scan replays the ledger in append order. Mutators hold a per-account
//! mutex across load, transition, and `WriteBatch` commit, so the state
//! change and its entries land atomically.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use amp_credits_core::{
    AccountId, CreditError, EntryId, LedgerEntry, PricingRule, PricingTable, RolloverSummary,
    Subscription, Tier, TopupPackage, TopupReceipt, TransactionType, Wallet,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::ops::{self, AccountState, ActionReceipt, SubscriptionEvent, UpgradeOutcome};
use crate::schema::{all_column_families, cf};
use crate::{EntryFilter, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// The mutex serializing mutators for one account.
    fn account_guard(&self, account_id: &AccountId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Database("account lock map poisoned".into()))?;
        Ok(Arc::clone(locks.entry(*account_id).or_default()))
    }

    fn load_state(&self, account_id: &AccountId) -> Result<Option<AccountState>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        self.db
            .get_cf(&cf, keys::account_key(account_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn require_state(&self, account_id: &AccountId) -> Result<AccountState> {
        self.load_state(account_id)?.ok_or_else(|| {
            CreditError::AccountNotFound {
                account_id: account_id.to_string(),
            }
            .into()
        })
    }

    /// Write the account state and any new ledger entries atomically.
    fn persist(&self, state: &AccountState, entries: &[LedgerEntry]) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_ledger = self.cf(cf::LEDGER)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_accounts,
            keys::account_key(&state.wallet.account_id),
            Self::serialize(state)?,
        );
        for entry in entries {
            batch.put_cf(
                &cf_ledger,
                keys::ledger_key(&entry.account_id, &entry.id),
                Self::serialize(entry)?,
            );
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Run a transition on one account's state under its lock, then commit
    /// the state and produced entries as one batch.
    fn with_account<T>(
        &self,
        account_id: &AccountId,
        f: impl FnOnce(&mut AccountState) -> Result<(T, Vec<LedgerEntry>)>,
    ) -> Result<T> {
        let guard = self.account_guard(account_id)?;
        let _held = guard
            .lock()
            .map_err(|_| StoreError::Database("account lock poisoned".into()))?;

        let mut state = self.require_state(account_id)?;
        let (value, entries) = f(&mut state)?;
        self.persist(&state, &entries)?;
        Ok(value)
    }

    /// Scan an account's ledger in append order.
    fn scan_entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>> {
        let cf_ledger = self.cf(cf::LEDGER)?;
        let prefix = keys::ledger_prefix(account_id);

        let iter = self.db.iterator_cf(
            &cf_ledger,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            entries.push(Self::deserialize(&value)?);
        }
        Ok(entries)
    }
}

impl Store for RocksStore {
    fn create_account(&self, account_id: AccountId, now: DateTime<Utc>) -> Result<AccountState> {
        let guard = self.account_guard(&account_id)?;
        let _held = guard
            .lock()
            .map_err(|_| StoreError::Database("account lock poisoned".into()))?;

        if self.load_state(&account_id)?.is_some() {
            return Err(CreditError::AccountAlreadyExists {
                account_id: account_id.to_string(),
            }
            .into());
        }

        let state = AccountState::provision(account_id, now);
        self.persist(&state, &[])?;
        tracing::debug!(account_id = %account_id, "account provisioned");
        Ok(state)
    }

    fn get_state(&self, account_id: &AccountId) -> Result<AccountState> {
        self.require_state(account_id)
    }

    fn archive_account(&self, account_id: &AccountId, now: DateTime<Utc>) -> Result<()> {
        self.with_account(account_id, |state| {
            state.wallet.is_archived = true;
            state.wallet.updated_at = now;
            Ok(((), Vec::new()))
        })
    }

    fn list_entries(
        &self,
        account_id: &AccountId,
        filter: &EntryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        self.require_state(account_id)?;
        let mut entries = self.scan_entries(account_id)?;
        entries.reverse(); // newest first
        Ok(entries
            .into_iter()
            .filter(|e| filter.matches(e))
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn all_entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>> {
        self.require_state(account_id)?;
        self.scan_entries(account_id)
    }

    fn commit_action(
        &self,
        account_id: &AccountId,
        rule: &PricingRule,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<ActionReceipt> {
        self.with_account(account_id, |state| {
            let (receipt, entry) = ops::commit_action(state, rule, quantity, now)?;
            Ok((receipt, entry.into_iter().collect()))
        })
    }

    fn grant_credit(
        &self,
        account_id: &AccountId,
        transaction_type: TransactionType,
        action_type: &str,
        amount: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<(i64, EntryId)> {
        self.with_account(account_id, |state| {
            let (balance, entry) =
                ops::credit(state, transaction_type, action_type, amount, description, now)?;
            let entry_id = entry.id;
            Ok(((balance, entry_id), vec![entry]))
        })
    }

    fn set_wallet_lock(
        &self,
        account_id: &AccountId,
        locked: bool,
        now: DateTime<Utc>,
    ) -> Result<Wallet> {
        self.with_account(account_id, |state| {
            if state.wallet.is_archived {
                return Err(CreditError::AccountNotFound {
                    account_id: state.wallet.account_id.to_string(),
                }
                .into());
            }
            state.wallet.is_locked = locked;
            state.wallet.updated_at = now;
            Ok((state.wallet.clone(), Vec::new()))
        })
    }

    fn confirm_topup(
        &self,
        account_id: &AccountId,
        package: &TopupPackage,
        external_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<TopupReceipt> {
        self.with_account(account_id, |state| {
            let (receipt, entry, applied) =
                ops::confirm_topup(state, package, external_reference, now)?;
            if applied {
                tracing::info!(
                    account_id = %receipt.account_id,
                    external_reference,
                    credits = receipt.credits,
                    "top-up confirmed"
                );
            }
            Ok((receipt, entry.into_iter().collect()))
        })
    }

    fn rollover(
        &self,
        account_id: &AccountId,
        table: &PricingTable,
        now: DateTime<Utc>,
    ) -> Result<RolloverSummary> {
        self.with_account(account_id, |state| {
            let (summary, entry) = ops::apply_rollover(state, table, now)?;
            Ok((summary, entry.into_iter().collect()))
        })
    }

    fn upgrade_subscription(
        &self,
        account_id: &AccountId,
        new_tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<UpgradeOutcome> {
        self.with_account(account_id, |state| {
            let (outcome, entry) = ops::upgrade(state, new_tier, now)?;
            Ok((outcome, entry.into_iter().collect()))
        })
    }

    fn schedule_downgrade(&self, account_id: &AccountId, new_tier: Tier) -> Result<Subscription> {
        self.with_account(account_id, |state| {
            state.subscription.schedule_downgrade(new_tier)?;
            Ok((state.subscription.clone(), Vec::new()))
        })
    }

    fn cancel_subscription(
        &self,
        account_id: &AccountId,
        at_period_end: bool,
    ) -> Result<Subscription> {
        self.with_account(account_id, |state| {
            state.subscription.cancel(at_period_end)?;
            Ok((state.subscription.clone(), Vec::new()))
        })
    }

    fn apply_subscription_event(
        &self,
        account_id: &AccountId,
        event: SubscriptionEvent,
    ) -> Result<Subscription> {
        self.with_account(account_id, |state| {
            ops::apply_subscription_event(state, event)?;
            Ok((state.subscription.clone(), Vec::new()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_credits_core::{summary, PackageType};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn account_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let account_id = AccountId::generate();

        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.create_account(account_id, Utc::now()).unwrap();
            store
                .grant_credit(
                    &account_id,
                    TransactionType::Bonus,
                    "bonus",
                    250,
                    "signup bonus".into(),
                    Utc::now(),
                )
                .unwrap();
        }

        let store = RocksStore::open(dir.path()).unwrap();
        let state = store.get_state(&account_id).unwrap();
        assert_eq!(state.wallet.balance, 250);

        let entries = store.all_entries(&account_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].balance_after, 250);
    }

    #[test]
    fn commit_action_writes_state_and_entry_together() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        store.create_account(account_id, Utc::now()).unwrap();
        store
            .grant_credit(
                &account_id,
                TransactionType::Bonus,
                "bonus",
                100,
                "funding".into(),
                Utc::now(),
            )
            .unwrap();

        let table = PricingTable::default();
        let rule = table.rule("creator_search").unwrap();
        let receipt = store.commit_action(&account_id, rule, 8, Utc::now()).unwrap();
        assert_eq!(receipt.quote.total_cost, 6);
        assert_eq!(receipt.balance_after, 94);

        let state = store.get_state(&account_id).unwrap();
        let entries = store.all_entries(&account_id).unwrap();
        assert_eq!(summary::replay_balance(&entries), state.wallet.balance);
        assert!(summary::verify_chain(&entries));
    }

    #[test]
    fn failed_commit_writes_nothing() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        store.create_account(account_id, Utc::now()).unwrap();

        let table = PricingTable::default();
        let rule = table.rule("audience_analysis").unwrap();
        let err = store
            .commit_action(&account_id, rule, 1, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Credit(CreditError::InsufficientBalance { .. })
        ));

        assert!(store.all_entries(&account_id).unwrap().is_empty());
        assert_eq!(store.get_state(&account_id).unwrap().wallet.balance, 0);
    }

    #[test]
    fn topup_idempotency_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let account_id = AccountId::generate();
        let package = TopupPackage::by_type(PackageType::Starter);

        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.create_account(account_id, Utc::now()).unwrap();
            store
                .confirm_topup(&account_id, &package, "pay_789", Utc::now())
                .unwrap();
        }

        let store = RocksStore::open(dir.path()).unwrap();
        let replay = store
            .confirm_topup(&account_id, &package, "pay_789", Utc::now())
            .unwrap();
        assert_eq!(replay.credits, package.credits);
        assert_eq!(
            store.get_state(&account_id).unwrap().wallet.balance,
            package.credits
        );
        assert_eq!(store.all_entries(&account_id).unwrap().len(), 1);
    }

    #[test]
    fn list_entries_newest_first_with_pagination() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        store.create_account(account_id, Utc::now()).unwrap();

        for i in 0..3 {
            store
                .grant_credit(
                    &account_id,
                    TransactionType::Bonus,
                    "bonus",
                    10,
                    format!("grant {i}"),
                    Utc::now(),
                )
                .unwrap();
            // ULIDs are generated at entry creation time; keep them distinct.
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let all = store
            .list_entries(&account_id, &EntryFilter::default(), 10, 0)
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].description, "grant 2");

        let page = store
            .list_entries(&account_id, &EntryFilter::default(), 1, 1)
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].description, "grant 1");
    }
}
