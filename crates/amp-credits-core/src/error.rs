//! Error types for the amp credit ledger.

use crate::ids::IdError;

/// Result type for credit ledger operations.
pub type Result<T> = std::result::Result<T, CreditError>;

/// Errors that can occur in credit ledger operations.
///
/// Duplicate top-up confirmations and duplicate rollover triggers are not
/// errors: both are reported as successful no-op outcomes so that webhook
/// retries and duplicate cycle triggers stay harmless.
#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    /// No pricing rule exists for the requested action type.
    #[error("unknown action type: {action_type}")]
    UnknownAction {
        /// The action type that has no pricing rule.
        action_type: String,
    },

    /// Debit exceeds the wallet balance, or the wallet is locked.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current balance in credits.
        balance: i64,
        /// Required amount in credits.
        required: i64,
    },

    /// Requested quantity is not a positive whole number.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Credit or price amount is not positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The subscription is not in a state that permits the operation.
    #[error("subscription state conflict: {0}")]
    SubscriptionStateConflict(String),

    /// Account not found.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account ID that was not found.
        account_id: String,
    },

    /// Account already provisioned.
    #[error("account already exists: {account_id}")]
    AccountAlreadyExists {
        /// The account ID that already exists.
        account_id: String,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A pricing rule is malformed (e.g. overlapping discount tiers).
    #[error("invalid pricing rule for {action_type}: {reason}")]
    InvalidPricingRule {
        /// The rule's action type.
        action_type: String,
        /// Why the rule is rejected.
        reason: String,
    },
}
