//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Account state (wallet, subscription, allowances, top-up receipts),
    /// keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Ledger entries, keyed by `account_id || entry_id`. ULID entry IDs
    /// are time-ordered, so a byte-ordered scan replays the ledger in
    /// append order.
    pub const LEDGER: &str = "ledger";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::ACCOUNTS, cf::LEDGER]
}
