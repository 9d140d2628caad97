//! In-memory storage backend.
//!
//! Accounts live in a map of per-account records, each behind its own
//! mutex. Every mutator locks one account record, runs the [`ops`]
//! transition on a direct reference to it, and appends the produced ledger
//! entries before releasing the lock, so concurrent spenders on the same
//! account observe both the balance change and its entry or neither.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use amp_credits_core::{
    AccountId, CreditError, EntryId, LedgerEntry, PricingRule, PricingTable, RolloverSummary,
    Subscription, Tier, TopupPackage, TopupReceipt, TransactionType, Wallet,
};

use crate::error::{Result, StoreError};
use crate::ops::{self, AccountState, ActionReceipt, SubscriptionEvent, UpgradeOutcome};
use crate::{EntryFilter, Store};

/// One account's state plus its append-only ledger.
#[derive(Debug)]
struct AccountRecord {
    state: AccountState,
    entries: Vec<LedgerEntry>,
}

/// In-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<AccountRecord>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, account_id: &AccountId) -> Result<Arc<Mutex<AccountRecord>>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| StoreError::Database("account map lock poisoned".into()))?;
        accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| not_found(account_id))
    }

    /// Run `f` on one account's record under its per-account lock.
    fn with_record<T>(
        &self,
        account_id: &AccountId,
        f: impl FnOnce(&mut AccountRecord) -> Result<T>,
    ) -> Result<T> {
        let record = self.record(account_id)?;
        let mut guard = record
            .lock()
            .map_err(|_| StoreError::Database("account record lock poisoned".into()))?;
        f(&mut guard)
    }
}

fn not_found(account_id: &AccountId) -> StoreError {
    CreditError::AccountNotFound {
        account_id: account_id.to_string(),
    }
    .into()
}

impl Store for MemoryStore {
    fn create_account(&self, account_id: AccountId, now: DateTime<Utc>) -> Result<AccountState> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| StoreError::Database("account map lock poisoned".into()))?;
        if accounts.contains_key(&account_id) {
            return Err(CreditError::AccountAlreadyExists {
                account_id: account_id.to_string(),
            }
            .into());
        }
        let state = AccountState::provision(account_id, now);
        accounts.insert(
            account_id,
            Arc::new(Mutex::new(AccountRecord {
                state: state.clone(),
                entries: Vec::new(),
            })),
        );
        tracing::debug!(account_id = %account_id, "account provisioned");
        Ok(state)
    }

    fn get_state(&self, account_id: &AccountId) -> Result<AccountState> {
        self.with_record(account_id, |record| Ok(record.state.clone()))
    }

    fn archive_account(&self, account_id: &AccountId, now: DateTime<Utc>) -> Result<()> {
        self.with_record(account_id, |record| {
            record.state.wallet.is_archived = true;
            record.state.wallet.updated_at = now;
            Ok(())
        })
    }

    fn list_entries(
        &self,
        account_id: &AccountId,
        filter: &EntryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        self.with_record(account_id, |record| {
            Ok(record
                .entries
                .iter()
                .rev() // newest first
                .filter(|e| filter.matches(e))
                .skip(offset)
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn all_entries(&self, account_id: &AccountId) -> Result<Vec<LedgerEntry>> {
        self.with_record(account_id, |record| Ok(record.entries.clone()))
    }

    fn commit_action(
        &self,
        account_id: &AccountId,
        rule: &PricingRule,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<ActionReceipt> {
        self.with_record(account_id, |record| {
            let (receipt, entry) = ops::commit_action(&mut record.state, rule, quantity, now)?;
            record.entries.extend(entry);
            Ok(receipt)
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
        self.with_record(account_id, |record| {
            let (balance, entry) = ops::credit(
                &mut record.state,
                transaction_type,
                action_type,
                amount,
                description,
                now,
            )?;
            let entry_id = entry.id;
            record.entries.push(entry);
            Ok((balance, entry_id))
        })
    }

    fn set_wallet_lock(
        &self,
        account_id: &AccountId,
        locked: bool,
        now: DateTime<Utc>,
    ) -> Result<Wallet> {
        self.with_record(account_id, |record| {
            if record.state.wallet.is_archived {
                return Err(not_found(account_id));
            }
            record.state.wallet.is_locked = locked;
            record.state.wallet.updated_at = now;
            Ok(record.state.wallet.clone())
        })
    }

    fn confirm_topup(
        &self,
        account_id: &AccountId,
        package: &TopupPackage,
        external_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<TopupReceipt> {
        self.with_record(account_id, |record| {
            let (receipt, entry, applied) =
                ops::confirm_topup(&mut record.state, package, external_reference, now)?;
            record.entries.extend(entry);
            if applied {
                tracing::info!(
                    account_id = %account_id,
                    external_reference,
                    credits = receipt.credits,
                    "top-up confirmed"
                );
            }
            Ok(receipt)
        })
    }

    fn rollover(
        &self,
        account_id: &AccountId,
        table: &PricingTable,
        now: DateTime<Utc>,
    ) -> Result<RolloverSummary> {
        self.with_record(account_id, |record| {
            let (summary, entry) = ops::apply_rollover(&mut record.state, table, now)?;
            record.entries.extend(entry);
            Ok(summary)
        })
    }

    fn upgrade_subscription(
        &self,
        account_id: &AccountId,
        new_tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<UpgradeOutcome> {
        self.with_record(account_id, |record| {
            let (outcome, entry) = ops::upgrade(&mut record.state, new_tier, now)?;
            record.entries.extend(entry);
            Ok(outcome)
        })
    }

    fn schedule_downgrade(&self, account_id: &AccountId, new_tier: Tier) -> Result<Subscription> {
        self.with_record(account_id, |record| {
            record.state.subscription.schedule_downgrade(new_tier)?;
            Ok(record.state.subscription.clone())
        })
    }

    fn cancel_subscription(
        &self,
        account_id: &AccountId,
        at_period_end: bool,
    ) -> Result<Subscription> {
        self.with_record(account_id, |record| {
            record.state.subscription.cancel(at_period_end)?;
            Ok(record.state.subscription.clone())
        })
    }

    fn apply_subscription_event(
        &self,
        account_id: &AccountId,
        event: SubscriptionEvent,
    ) -> Result<Subscription> {
        self.with_record(account_id, |record| {
            ops::apply_subscription_event(&mut record.state, event)?;
            Ok(record.state.subscription.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_credits_core::summary;

    fn provisioned() -> (MemoryStore, AccountId) {
        let store = MemoryStore::new();
        let account_id = AccountId::generate();
        store.create_account(account_id, Utc::now()).unwrap();
        (store, account_id)
    }

    #[test]
    fn create_account_twice_fails() {
        let (store, account_id) = provisioned();
        let err = store.create_account(account_id, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Credit(CreditError::AccountAlreadyExists { .. })
        ));
    }

    #[test]
    fn unknown_account_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_state(&AccountId::generate()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Credit(CreditError::AccountNotFound { .. })
        ));
    }

    #[test]
    fn ledger_reconciles_after_mixed_operations() {
        let (store, account_id) = provisioned();
        let table = PricingTable::default();
        let rule = table.rule("creator_search").unwrap();
        let now = Utc::now();

        store
            .grant_credit(
                &account_id,
                TransactionType::Bonus,
                "bonus",
                100,
                "welcome bonus".into(),
                now,
            )
            .unwrap();
        store.commit_action(&account_id, rule, 8, now).unwrap();
        store
            .confirm_topup(
                &account_id,
                &TopupPackage::by_type(amp_credits_core::PackageType::Starter),
                "pay_1",
                now,
            )
            .unwrap();

        let state = store.get_state(&account_id).unwrap();
        let entries = store.all_entries(&account_id).unwrap();
        assert_eq!(summary::replay_balance(&entries), state.wallet.balance);
        assert!(summary::verify_chain(&entries));
    }

    #[test]
    fn list_entries_filters_and_paginates() {
        let (store, account_id) = provisioned();
        let now = Utc::now();
        for i in 0..5 {
            store
                .grant_credit(
                    &account_id,
                    TransactionType::Bonus,
                    "bonus",
                    10 + i,
                    format!("bonus {i}"),
                    now,
                )
                .unwrap();
        }

        let all = store
            .list_entries(&account_id, &EntryFilter::default(), 10, 0)
            .unwrap();
        assert_eq!(all.len(), 5);
        // Newest first.
        assert_eq!(all[0].description, "bonus 4");

        let page = store
            .list_entries(&account_id, &EntryFilter::default(), 2, 2)
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].description, "bonus 2");

        let searched = store
            .list_entries(
                &account_id,
                &EntryFilter {
                    search: Some("bonus 3".into()),
                    ..EntryFilter::default()
                },
                10,
                0,
            )
            .unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let (store, account_id) = provisioned();
        let now = Utc::now();
        store
            .grant_credit(
                &account_id,
                TransactionType::Bonus,
                "bonus",
                100,
                "funding".into(),
                now,
            )
            .unwrap();

        // audience_analysis: 8 credits, no free allowance. 100/8 = 12 can
        // succeed out of 32 attempts.
        let table = PricingTable::default();
        let rule = table.rule("audience_analysis").unwrap().clone();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                let rule = rule.clone();
                std::thread::spawn(move || {
                    store.commit_action(&account_id, &rule, 1, Utc::now()).is_ok()
                })
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join())
            .filter(|r| matches!(r, Ok(true)))
            .count();

        assert_eq!(successes, 12);
        let state = store.get_state(&account_id).unwrap();
        assert_eq!(state.wallet.balance, 100 - 12 * 8);
        assert!(state.wallet.balance >= 0);

        let entries = store.all_entries(&account_id).unwrap();
        assert_eq!(summary::replay_balance(&entries), state.wallet.balance);
    }

    #[test]
    fn archived_account_rejects_spending() {
        let (store, account_id) = provisioned();
        store.archive_account(&account_id, Utc::now()).unwrap();

        let table = PricingTable::default();
        let rule = table.rule("creator_report").unwrap();
        let err = store
            .commit_action(&account_id, rule, 1, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Credit(CreditError::AccountNotFound { .. })
        ));
    }
}
