//! Key encoding for the `RocksDB` backend.
//!
//! Every index key starts with the 16 user-id bytes so a user's rows are one
//! contiguous prefix range, and ends with the 16 entry-id bytes so rows inside
//! a prefix sort chronologically.

use credits_core::{EntryId, PeriodKey, PeriodType, UserId};

/// Length of a user id or entry id in bytes.
const ID_LEN: usize = 16;

/// Key of a ledger entry.
#[must_use]
pub fn entry_key(entry_id: &EntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Key of a profile.
#[must_use]
pub fn profile_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Key of a configuration value.
#[must_use]
pub fn config_key(key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// Prefix covering all of a user's entries in the by-user index.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// By-user index key: `user_id || entry_id`.
#[must_use]
pub fn user_entry_key(user_id: &UserId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN * 2);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Prefix covering one accounting period of one user.
///
/// The key is terminated with `0x00` so `2026-1` can never prefix-match
/// `2026-10`.
#[must_use]
pub fn period_prefix(user_id: &UserId, period_type: PeriodType, period_key: &PeriodKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN + 2 + period_key.as_str().len() + ID_LEN);
    key.extend_from_slice(user_id.as_bytes());
    key.push(period_type.tag());
    key.extend_from_slice(period_key.as_str().as_bytes());
    key.push(0);
    key
}

/// Period index key: `period_prefix || entry_id`.
#[must_use]
pub fn period_entry_key(
    user_id: &UserId,
    period_type: PeriodType,
    period_key: &PeriodKey,
    entry_id: &EntryId,
) -> Vec<u8> {
    let mut key = period_prefix(user_id, period_type, period_key);
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Recover the entry id from the tail of a by-user index key.
///
/// Returns `None` for keys that are not exactly `user_id || entry_id`.
#[must_use]
pub fn entry_id_from_user_key(key: &[u8]) -> Option<EntryId> {
    if key.len() != ID_LEN * 2 {
        return None;
    }
    let bytes: [u8; ID_LEN] = key[ID_LEN..].try_into().ok()?;
    Some(EntryId::from_bytes(bytes))
}
