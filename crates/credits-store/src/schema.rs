//! Column families used by the `RocksDB` backend.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Ledger entries, keyed by `entry_id` (ULID).
    pub const LEDGER: &str = "ledger";

    /// Index: entries by user, keyed by `user_id || entry_id`.
    /// Value is empty (index only).
    pub const LEDGER_BY_USER: &str = "ledger_by_user";

    /// Index: entries by accounting period, keyed by
    /// `user_id || period_tag || period_key || 0x00 || entry_id`.
    /// Value is the CBOR-encoded `PeriodDelta`.
    pub const LEDGER_BY_PERIOD: &str = "ledger_by_period";

    /// Configuration values, keyed by config key.
    pub const CONFIG: &str = "config";

    /// User profiles, keyed by `user_id`.
    pub const PROFILES: &str = "profiles";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::LEDGER,
        cf::LEDGER_BY_USER,
        cf::LEDGER_BY_PERIOD,
        cf::CONFIG,
        cf::PROFILES,
    ]
}
