//! Read-only summaries derived by replaying the ledger.
//!
//! Everything here is a pure function over a slice of entries; the
//! reconciliation check (`replay_balance`) is the primary audit that the
//! wallet and ledger agree.

use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::LedgerEntry;

/// Aggregate credits in and out over a range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InOutSummary {
    /// Sum of earned + purchased + bonus + refunded amounts.
    pub credits_in: i64,

    /// Sum of spent + expired amounts, as a positive number.
    pub credits_out: i64,

    /// `credits_in - credits_out`.
    pub net: i64,
}

/// In/out totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBreakdown {
    /// Calendar month, formatted `YYYY-MM`.
    pub month: String,

    /// Credits in during the month.
    pub credits_in: i64,

    /// Credits out during the month.
    pub credits_out: i64,

    /// Net change during the month.
    pub net: i64,
}

/// Spending totals for one action type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingByAction {
    /// The action type.
    pub action_type: String,

    /// Credits spent on this action, as a positive number.
    pub credits_spent: i64,

    /// Number of `spent` entries.
    pub entry_count: u64,
}

/// Replay all entry amounts from zero. Must equal the current wallet
/// balance for every account at any point in time.
#[must_use]
pub fn replay_balance(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(|e| e.amount).sum()
}

/// Verify the per-entry chaining invariant: each `balance_after` equals the
/// previous `balance_after` plus the entry's amount, starting from zero.
#[must_use]
pub fn verify_chain(entries: &[LedgerEntry]) -> bool {
    let mut running = 0;
    for entry in entries {
        running += entry.amount;
        if entry.balance_after != running {
            return false;
        }
    }
    true
}

/// Sum credits in and out over an optional date range (inclusive start,
/// exclusive end).
#[must_use]
pub fn summarize(
    entries: &[LedgerEntry],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> InOutSummary {
    let mut summary = InOutSummary::default();
    for entry in entries.iter().filter(|e| in_range(e, from, to)) {
        if entry.transaction_type.is_credit() {
            summary.credits_in += entry.amount;
        } else {
            summary.credits_out += entry.amount.abs();
        }
    }
    summary.net = summary.credits_in - summary.credits_out;
    summary
}

/// Group entries into calendar months and total each month, oldest first.
#[must_use]
pub fn monthly_breakdown(
    entries: &[LedgerEntry],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Vec<MonthlyBreakdown> {
    let mut months: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for entry in entries.iter().filter(|e| in_range(e, from, to)) {
        let key = month_key(entry.created_at);
        let bucket = months.entry(key).or_default();
        if entry.transaction_type.is_credit() {
            bucket.0 += entry.amount;
        } else {
            bucket.1 += entry.amount.abs();
        }
    }
    months
        .into_iter()
        .map(|(month, (credits_in, credits_out))| MonthlyBreakdown {
            month,
            credits_in,
            credits_out,
            net: credits_in - credits_out,
        })
        .collect()
}

/// Spending totals per action type over the last `months` calendar months,
/// highest spend first.
#[must_use]
pub fn spending_by_action(
    entries: &[LedgerEntry],
    now: DateTime<Utc>,
    months: u32,
) -> Vec<SpendingByAction> {
    let from = now
        .checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut totals: BTreeMap<&str, (i64, u64)> = BTreeMap::new();
    for entry in entries
        .iter()
        .filter(|e| e.transaction_type.is_debit() && e.created_at >= from && e.created_at < now)
    {
        let bucket = totals.entry(entry.action_type.as_str()).or_default();
        bucket.0 += entry.amount.abs();
        bucket.1 += 1;
    }

    let mut result: Vec<_> = totals
        .into_iter()
        .map(|(action_type, (credits_spent, entry_count))| SpendingByAction {
            action_type: action_type.to_string(),
            credits_spent,
            entry_count,
        })
        .collect();
    result.sort_by(|a, b| b.credits_spent.cmp(&a.credits_spent));
    result
}

fn in_range(
    entry: &LedgerEntry,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> bool {
    from.map_or(true, |f| entry.created_at >= f) && to.map_or(true, |t| entry.created_at < t)
}

fn month_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}
