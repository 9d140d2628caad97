//! Transactional account operations.
//!
//! Every function here runs while the backend holds the per-account lock
//! and mutates an [`AccountState`] snapshot; the backend then persists the
//! mutated state and any produced ledger entries as one atomic write. This
//! keeps the Wallet/Ledger pairing invariant (one entry per mutation,
//! both-or-neither) independent of the backend.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use amp_credits_core::{
    AccountId, AllowanceState, CreditError, EntryId, LedgerEntry, PricingRule, PricingTable,
    Quote, RolloverSummary, Subscription, Tier, TopupPackage, TopupReceipt, TransactionType,
    Wallet,
};

use crate::error::Result;

/// Everything the transactional operations need about one account, minus
/// the ledger itself (entries are append-only and returned for the backend
/// to persist).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    /// The wallet.
    pub wallet: Wallet,

    /// The subscription.
    pub subscription: Subscription,

    /// Allowance consumption per action type.
    pub allowances: HashMap<String, AllowanceState>,

    /// Confirmed top-ups keyed by the processor's external reference.
    pub receipts: HashMap<String, TopupReceipt>,
}

impl AccountState {
    /// Provision a fresh account: empty wallet, free-tier subscription.
    #[must_use]
    pub fn provision(account_id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            wallet: Wallet::new(account_id, now),
            subscription: Subscription::new(now),
            allowances: HashMap::new(),
            receipts: HashMap::new(),
        }
    }

    /// Remaining free allowance for an action type this cycle.
    #[must_use]
    pub fn remaining_allowance(&self, rule: &PricingRule) -> u32 {
        self.allowances
            .get(&rule.action_type)
            .map_or(rule.free_allowance_per_month, |a| a.remaining(rule))
    }

    /// Pure quote against the current allowance state. Mutates nothing.
    #[must_use]
    pub fn quote(&self, rule: &PricingRule, quantity: u32) -> Quote {
        rule.quote(self.remaining_allowance(rule), quantity)
    }
}

/// Outcome of a committed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReceipt {
    /// The quote recomputed at commit time; `total_cost` is the charge.
    pub quote: Quote,

    /// Wallet balance after the commit.
    pub balance_after: i64,

    /// The `spent` ledger entry, absent when the allowance covered the
    /// whole quantity and no wallet mutation occurred.
    pub entry_id: Option<EntryId>,
}

/// Outcome of an immediate tier upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeOutcome {
    /// The tier now in effect.
    pub tier: Tier,

    /// Prorated credits granted for the cycle remainder.
    pub granted_credits: i64,

    /// Wallet balance after the grant.
    pub balance: i64,
}

/// Subscription lifecycle events reported by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionEvent {
    /// A recurring payment failed.
    PaymentFailed,

    /// A previously failed payment was recovered.
    PaymentRecovered,

    /// The trial ended with payment confirmed.
    TrialConverted,
}

/// Commit a priced action: recompute the quote against current allowance
/// state, check the balance, consume allowance, debit, and emit the paired
/// `spent` entry. All-or-nothing: a failed balance check mutates nothing.
///
/// # Errors
///
/// `InsufficientBalance` if the wallet is locked or the recomputed cost
/// exceeds the balance; `AccountNotFound` if the wallet is archived.
pub fn commit_action(
    state: &mut AccountState,
    rule: &PricingRule,
    quantity: u32,
    now: DateTime<Utc>,
) -> Result<(ActionReceipt, Option<LedgerEntry>)> {
    let quote = state.quote(rule, quantity);

    // Check-then-act is safe here: the caller holds the account lock.
    state.wallet.can_debit(quote.total_cost)?;

    let cycle_start = state.wallet.cycle_start;
    state
        .allowances
        .entry(rule.action_type.clone())
        .or_insert_with(|| AllowanceState::new(cycle_start))
        .consume(rule, quantity);

    if quote.total_cost == 0 {
        // Fully covered by the free allowance: no wallet mutation, so no
        // ledger entry either.
        let receipt = ActionReceipt {
            balance_after: state.wallet.balance,
            entry_id: None,
            quote,
        };
        return Ok((receipt, None));
    }

    let balance_after = state.wallet.apply_debit(quote.total_cost, now)?;
    let entry = LedgerEntry::spent(
        state.wallet.account_id,
        &quote.action_type,
        quote.total_cost,
        balance_after,
        format!("{} x{}", quote.action_type, quote.quantity),
        now,
    );
    let receipt = ActionReceipt {
        balance_after,
        entry_id: Some(entry.id),
        quote,
    };
    Ok((receipt, Some(entry)))
}

/// Credit the wallet and emit the paired entry.
///
/// # Errors
///
/// `InvalidAmount` for non-positive amounts or debit transaction types;
/// `AccountNotFound` if the wallet is archived.
pub fn credit(
    state: &mut AccountState,
    transaction_type: TransactionType,
    action_type: &str,
    amount: i64,
    description: String,
    now: DateTime<Utc>,
) -> Result<(i64, LedgerEntry)> {
    let balance = state.wallet.apply_credit(transaction_type, amount, now)?;
    let account_id = state.wallet.account_id;
    let entry = match transaction_type {
        TransactionType::Bonus => {
            LedgerEntry::bonus(account_id, amount, balance, description, now)
        }
        TransactionType::Refunded => {
            LedgerEntry::refunded(account_id, action_type, amount, balance, description, now)
        }
        TransactionType::Purchased => {
            LedgerEntry::purchased(account_id, action_type, amount, balance, description, now)
        }
        _ => LedgerEntry::earned(account_id, action_type, amount, balance, description, now),
    };
    Ok((balance, entry))
}

/// Convert a confirmed external purchase into a wallet credit.
///
/// Idempotent on `external_reference`: a replayed confirmation returns the
/// original receipt and produces no new entry.
///
/// # Errors
///
/// `AccountNotFound` if the wallet is archived.
pub fn confirm_topup(
    state: &mut AccountState,
    package: &TopupPackage,
    external_reference: &str,
    now: DateTime<Utc>,
) -> Result<(TopupReceipt, Option<LedgerEntry>, bool)> {
    if let Some(existing) = state.receipts.get(external_reference) {
        tracing::debug!(
            external_reference,
            entry_id = %existing.entry_id,
            "duplicate purchase confirmation, returning original receipt"
        );
        return Ok((existing.clone(), None, false));
    }

    let (balance, entry) = credit(
        state,
        TransactionType::Purchased,
        package.package_type.action_tag(),
        package.credits,
        format!("{:?} top-up package", package.package_type),
        now,
    )?;

    let receipt = TopupReceipt {
        account_id: state.wallet.account_id,
        external_reference: external_reference.to_string(),
        package_type: package.package_type,
        credits: package.credits,
        entry_id: entry.id,
        balance_after: balance,
        confirmed_at: now,
    };
    state
        .receipts
        .insert(external_reference.to_string(), receipt.clone());
    Ok((receipt, Some(entry), true))
}

/// Roll the billing cycle over: advance the cycle window, apply pending
/// downgrade/cancellation, grant the tier's monthly credits, and reset
/// every allowance. One transactional step; a duplicate trigger within the
/// same cycle is reported as `applied: false` and changes nothing.
///
/// # Errors
///
/// `AccountNotFound` if the wallet is archived.
pub fn apply_rollover(
    state: &mut AccountState,
    table: &PricingTable,
    now: DateTime<Utc>,
) -> Result<(RolloverSummary, Option<LedgerEntry>)> {
    if state.wallet.is_archived {
        return Err(CreditError::AccountNotFound {
            account_id: state.wallet.account_id.to_string(),
        }
        .into());
    }

    if !state.wallet.cycle_elapsed(now) {
        return Ok((
            RolloverSummary {
                applied: false,
                cycle_start: state.wallet.cycle_start,
                cycle_end: state.wallet.cycle_end,
                granted_credits: 0,
                tier: state.subscription.tier,
                status: state.subscription.status,
            },
            None,
        ));
    }

    state.wallet.advance_cycle(now);
    let granted = state.subscription.apply_rollover();

    let cycle_start = state.wallet.cycle_start;
    for action_type in table.action_types() {
        state
            .allowances
            .entry(action_type.to_string())
            .or_insert_with(|| AllowanceState::new(cycle_start))
            .reset(cycle_start);
    }

    let entry = if granted > 0 {
        let balance = state
            .wallet
            .apply_credit(TransactionType::Earned, granted, now)?;
        Some(LedgerEntry::earned(
            state.wallet.account_id,
            "monthly_grant",
            granted,
            balance,
            format!("Monthly {:?} tier grant", state.subscription.tier),
            now,
        ))
    } else {
        None
    };

    Ok((
        RolloverSummary {
            applied: true,
            cycle_start: state.wallet.cycle_start,
            cycle_end: state.wallet.cycle_end,
            granted_credits: granted,
            tier: state.subscription.tier,
            status: state.subscription.status,
        },
        entry,
    ))
}

/// Upgrade the subscription immediately, crediting the prorated grant.
///
/// # Errors
///
/// `SubscriptionStateConflict` for invalid transitions; `AccountNotFound`
/// if the wallet is archived.
pub fn upgrade(
    state: &mut AccountState,
    new_tier: Tier,
    now: DateTime<Utc>,
) -> Result<(UpgradeOutcome, Option<LedgerEntry>)> {
    let granted = state.subscription.upgrade(new_tier, now)?;

    let entry = if granted > 0 {
        let (_, entry) = credit(
            state,
            TransactionType::Earned,
            "upgrade_proration",
            granted,
            format!("Prorated grant for upgrade to {new_tier:?}"),
            now,
        )?;
        Some(entry)
    } else {
        None
    };

    Ok((
        UpgradeOutcome {
            tier: state.subscription.tier,
            granted_credits: granted,
            balance: state.wallet.balance,
        },
        entry,
    ))
}

/// Apply a processor-reported subscription lifecycle event.
///
/// # Errors
///
/// `SubscriptionStateConflict` for invalid transitions.
pub fn apply_subscription_event(
    state: &mut AccountState,
    event: SubscriptionEvent,
) -> Result<()> {
    match event {
        SubscriptionEvent::PaymentFailed => state.subscription.mark_past_due()?,
        SubscriptionEvent::PaymentRecovered => state.subscription.mark_recovered()?,
        SubscriptionEvent::TrialConverted => state.subscription.activate_from_trial()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_credits_core::{PackageType, SubscriptionStatus};
    use chrono::Duration;

    fn funded_state(balance: i64) -> AccountState {
        let mut state = AccountState::provision(AccountId::generate(), Utc::now());
        state.wallet.balance = balance;
        state
    }

    fn search_rule() -> PricingRule {
        PricingTable::default().rule("creator_search").unwrap().clone()
    }

    #[test]
    fn commit_scenario_from_contract() {
        // Balance 100, rule {2 credits, 5 free}, quantity 8:
        // 5 free, 3 billable, cost 6, balance 94, entry -6.
        let mut state = funded_state(100);
        let rule = search_rule();
        let now = Utc::now();

        let (receipt, entry) = commit_action(&mut state, &rule, 8, now).unwrap();
        assert_eq!(receipt.quote.free_quantity, 5);
        assert_eq!(receipt.quote.billable_quantity, 3);
        assert_eq!(receipt.quote.total_cost, 6);
        assert_eq!(receipt.balance_after, 94);
        assert_eq!(state.wallet.balance, 94);

        let entry = entry.unwrap();
        assert_eq!(entry.amount, -6);
        assert_eq!(entry.balance_after, 94);
        assert_eq!(entry.transaction_type, TransactionType::Spent);
    }

    #[test]
    fn commit_fully_free_produces_no_entry() {
        let mut state = funded_state(100);
        let rule = search_rule();

        let (receipt, entry) = commit_action(&mut state, &rule, 3, Utc::now()).unwrap();
        assert_eq!(receipt.quote.total_cost, 0);
        assert!(entry.is_none());
        assert_eq!(state.wallet.balance, 100);
        // Allowance was still consumed.
        assert_eq!(state.remaining_allowance(&rule), 2);
    }

    #[test]
    fn commit_insufficient_balance_mutates_nothing() {
        let mut state = funded_state(5);
        let rule = search_rule();

        // 8 requested, 5 free, 3 billable at 2 = 6 > 5.
        let err = commit_action(&mut state, &rule, 8, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            crate::StoreError::Credit(CreditError::InsufficientBalance {
                balance: 5,
                required: 6
            })
        ));
        assert_eq!(state.wallet.balance, 5);
        assert_eq!(state.remaining_allowance(&rule), 5); // allowance untouched
    }

    #[test]
    fn quote_then_commit_parity() {
        let mut state = funded_state(1000);
        let rule = search_rule();

        let quoted = state.quote(&rule, 60);
        let (receipt, _) = commit_action(&mut state, &rule, 60, Utc::now()).unwrap();
        assert_eq!(receipt.quote.total_cost, quoted.total_cost);
    }

    #[test]
    fn topup_confirmation_is_idempotent() {
        let mut state = funded_state(0);
        let package = TopupPackage::by_type(PackageType::Starter);
        let now = Utc::now();

        let (first, entry, applied) =
            confirm_topup(&mut state, &package, "pay_abc123", now).unwrap();
        assert!(applied);
        assert!(entry.is_some());
        assert_eq!(state.wallet.balance, package.credits);

        let (replay, entry, applied) =
            confirm_topup(&mut state, &package, "pay_abc123", now).unwrap();
        assert!(!applied);
        assert!(entry.is_none());
        assert_eq!(replay.entry_id, first.entry_id);
        // Credited exactly once.
        assert_eq!(state.wallet.balance, package.credits);
    }

    #[test]
    fn rollover_grants_and_resets_once() {
        let table = PricingTable::default();
        let rule = search_rule();
        let mut state = funded_state(50);
        state.subscription.tier = Tier::Standard;
        commit_action(&mut state, &rule, 5, Utc::now()).unwrap();
        assert_eq!(state.remaining_allowance(&rule), 0);

        let after_cycle = state.wallet.cycle_end + Duration::seconds(1);
        let (summary, entry) = apply_rollover(&mut state, &table, after_cycle).unwrap();
        assert!(summary.applied);
        assert_eq!(summary.granted_credits, Tier::Standard.monthly_credits());
        assert_eq!(entry.unwrap().action_type, "monthly_grant");
        assert_eq!(state.remaining_allowance(&rule), rule.free_allowance_per_month);

        // Duplicate trigger in the new cycle is a no-op.
        let balance_before = state.wallet.balance;
        let (summary, entry) = apply_rollover(&mut state, &table, after_cycle).unwrap();
        assert!(!summary.applied);
        assert!(entry.is_none());
        assert_eq!(state.wallet.balance, balance_before);
    }

    #[test]
    fn rollover_applies_pending_cancellation_without_grant() {
        let table = PricingTable::default();
        let mut state = funded_state(0);
        state.subscription.tier = Tier::Premium;
        state.subscription.cancel(true).unwrap();

        let after_cycle = state.wallet.cycle_end + Duration::seconds(1);
        let (summary, entry) = apply_rollover(&mut state, &table, after_cycle).unwrap();
        assert!(summary.applied);
        assert_eq!(summary.status, SubscriptionStatus::Cancelled);
        assert_eq!(summary.granted_credits, 0);
        assert!(entry.is_none());
    }

    #[test]
    fn upgrade_credits_prorated_difference() {
        let now = Utc::now();
        let mut state = funded_state(0);
        state.subscription.tier = Tier::Standard;
        state.subscription.current_period_start = now - Duration::days(15);
        state.subscription.current_period_end = now + Duration::days(15);

        let (outcome, entry) = upgrade(&mut state, Tier::Premium, now).unwrap();
        assert_eq!(outcome.tier, Tier::Premium);
        assert_eq!(outcome.granted_credits, 750);
        assert_eq!(outcome.balance, 750);
        assert_eq!(entry.unwrap().action_type, "upgrade_proration");
    }

    #[test]
    fn subscription_event_transitions() {
        let mut state = funded_state(0);
        apply_subscription_event(&mut state, SubscriptionEvent::PaymentFailed).unwrap();
        assert_eq!(state.subscription.status, SubscriptionStatus::PastDue);
        apply_subscription_event(&mut state, SubscriptionEvent::PaymentRecovered).unwrap();
        assert_eq!(state.subscription.status, SubscriptionStatus::Active);
        assert!(
            apply_subscription_event(&mut state, SubscriptionEvent::TrialConverted).is_err()
        );
    }
}
