//! Wallet summary, transaction history, and analytics handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use amp_credits_core::{summary, LedgerEntry, TransactionType};
use amp_credits_store::EntryFilter;

use crate::auth::AuthAccount;
use crate::error::ApiError;
use crate::state::AppState;

/// Remaining free allowance for one action type.
#[derive(Debug, Serialize)]
pub struct AllowanceSummary {
    /// The action type.
    pub action_type: String,
    /// Free actions per month for this action type.
    pub free_allowance_per_month: u32,
    /// Free actions used this cycle.
    pub used_this_month: u32,
    /// Free actions remaining this cycle.
    pub remaining: u32,
}

/// Wallet summary response.
#[derive(Debug, Serialize)]
pub struct WalletSummaryResponse {
    /// Current balance in credits.
    pub balance: i64,
    /// Whether the wallet is locked.
    pub is_locked: bool,
    /// When the current billing cycle started.
    pub cycle_start: String,
    /// When allowances next reset.
    pub next_reset: String,
    /// Credits granted by subscription plans over the account's lifetime.
    pub lifetime_plan_credits: i64,
    /// Credits purchased via top-ups over the account's lifetime.
    pub lifetime_purchased_credits: i64,
    /// Bonus credits received over the account's lifetime.
    pub lifetime_bonus_credits: i64,
    /// Credits refunded over the account's lifetime.
    pub lifetime_refunded_credits: i64,
    /// Credits spent over the account's lifetime.
    pub lifetime_spent_credits: i64,
    /// Per-action free allowance usage this cycle.
    pub allowances: Vec<AllowanceSummary>,
}

/// Get the wallet summary: balance, lock state, cycle window, lifetime
/// buckets, and per-action allowance usage.
pub async fn wallet_summary(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> Result<Json<WalletSummaryResponse>, ApiError> {
    let account = state.store.get_state(&auth.account_id)?;

    let allowances: Vec<_> = state
        .config
        .pricing
        .action_types()
        .filter_map(|action_type| state.config.pricing.rule(action_type).ok())
        .map(|rule| {
            let remaining = account.remaining_allowance(rule);
            AllowanceSummary {
                action_type: rule.action_type.clone(),
                free_allowance_per_month: rule.free_allowance_per_month,
                used_this_month: rule.free_allowance_per_month - remaining,
                remaining,
            }
        })
        .collect();

    Ok(Json(WalletSummaryResponse {
        balance: account.wallet.balance,
        is_locked: account.wallet.is_locked,
        cycle_start: account.wallet.cycle_start.to_rfc3339(),
        next_reset: account.wallet.cycle_end.to_rfc3339(),
        lifetime_plan_credits: account.wallet.lifetime_plan_credits,
        lifetime_purchased_credits: account.wallet.lifetime_purchased_credits,
        lifetime_bonus_credits: account.wallet.lifetime_bonus_credits,
        lifetime_refunded_credits: account.wallet.lifetime_refunded_credits,
        lifetime_spent_credits: account.wallet.lifetime_spent_credits,
        allowances,
    }))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of entries to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
    /// Only entries with this action type.
    pub action_type: Option<String>,
    /// Only entries created at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Only entries created before this instant.
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring search over description and action type.
    pub search: Option<String>,
}

fn default_limit() -> usize {
    50
}

/// One ledger entry in a transaction listing.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Entry ID (ULID).
    pub id: String,
    /// Signed credit amount (positive = credit, negative = debit).
    pub amount: i64,
    /// Transaction type.
    pub transaction_type: TransactionType,
    /// The action type this entry relates to.
    pub action_type: String,
    /// Wallet balance after this entry.
    pub balance_after: i64,
    /// Description.
    pub description: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&LedgerEntry> for TransactionResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            amount: entry.amount,
            transaction_type: entry.transaction_type,
            action_type: entry.action_type.clone(),
            balance_after: entry.balance_after,
            description: entry.description.clone(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Transaction list response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Entries, newest first.
    pub transactions: Vec<TransactionResponse>,
    /// Whether more entries exist beyond this page.
    pub has_more: bool,
}

/// List ledger entries, newest first, with pagination and filtering.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let filter = EntryFilter {
        action_type: query.action_type,
        from: query.from,
        to: query.to,
        search: query.search,
    };

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let entries = state
        .store
        .list_entries(&auth.account_id, &filter, limit + 1, query.offset)?;

    let has_more = entries.len() > limit;
    let transactions: Vec<_> = entries
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// In/out summary query parameters.
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Start of the range (inclusive).
    pub from: Option<DateTime<Utc>>,
    /// End of the range (exclusive).
    pub to: Option<DateTime<Utc>>,
}

/// In/out summary response with monthly breakdown.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    /// Total credits in over the range.
    pub credits_in: i64,
    /// Total credits out over the range.
    pub credits_out: i64,
    /// Net movement (in minus out).
    pub net: i64,
    /// Per-calendar-month totals, oldest first.
    pub monthly: Vec<summary::MonthlyBreakdown>,
}

/// Summarize credits in and out over a date range, with a monthly
/// breakdown. Computed by replaying the ledger.
pub async fn in_out_summary(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let entries = state.store.all_entries(&auth.account_id)?;

    let totals = summary::summarize(&entries, query.from, query.to);
    let monthly = summary::monthly_breakdown(&entries, query.from, query.to);

    Ok(Json(SummaryResponse {
        credits_in: totals.credits_in,
        credits_out: totals.credits_out,
        net: totals.net,
        monthly,
    }))
}

/// Spending analytics query parameters.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// How many calendar months to look back (default: 6, max: 24).
    #[serde(default = "default_months")]
    pub months: u32,
}

fn default_months() -> u32 {
    6
}

/// Spending analytics response.
#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    /// Months covered.
    pub months: u32,
    /// Spending per action type, highest first.
    pub spending: Vec<summary::SpendingByAction>,
}

/// Spending totals per action type over the last N months.
pub async fn spending_analytics(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let months = query.months.clamp(1, 24);
    let entries = state.store.all_entries(&auth.account_id)?;

    let spending = summary::spending_by_action(&entries, Utc::now(), months);

    Ok(Json(AnalyticsResponse { months, spending }))
}
