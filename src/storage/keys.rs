//! Ledger key layout.
//!
//! ```text
//! <prefix><assetID>                      current state
//! ~hist/<prefix><assetID>/<sequence:020> history entry
//! ~sys/<name>                            engine bookkeeping
//! ```
//!
//! Sequences are zero-padded to 20 digits so lexical key order equals
//! sequence order for every `u64`.

/// First character of every key outside the asset keyspace.
pub const RESERVED_MARKER: char = '~';

/// Root of the history keyspace.
pub const HISTORY_ROOT: &str = "~hist/";

/// Root of the engine bookkeeping keyspace.
pub const SYSTEM_ROOT: &str = "~sys/";

/// Persisted engine settings.
pub const SETTINGS_KEY: &str = "~sys/settings";

/// Contract identity stored by `initContract`.
pub const CONTRACT_KEY: &str = "~sys/contract";

/// Most-recently-updated asset keys.
pub const RECENT_KEY: &str = "~sys/recent";

/// Current-state key of an asset.
#[must_use]
pub fn current_key(prefix: &str, asset_id: &str) -> String {
    format!("{prefix}{asset_id}")
}

/// Key prefix shared by every history entry of `key`.
#[must_use]
pub fn history_prefix(key: &str) -> String {
    format!("{HISTORY_ROOT}{key}/")
}

/// Key of one history entry.
#[must_use]
pub fn history_key(key: &str, sequence: u64) -> String {
    format!("{HISTORY_ROOT}{key}/{sequence:020}")
}

/// True if a class prefix would collide with the reserved keyspaces.
#[must_use]
pub fn is_reserved(prefix: &str) -> bool {
    prefix.starts_with(RESERVED_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keys_sort_by_sequence() {
        let mut keys: Vec<_> = [10, 2, 1_000, u64::MAX, 0]
            .into_iter()
            .map(|s| history_key("AST.A1", s))
            .collect();
        keys.sort();
        assert_eq!(keys.first().map(String::as_str), Some("~hist/AST.A1/00000000000000000000"));
        assert!(keys.last().is_some_and(|k| k.ends_with(&u64::MAX.to_string())));
        assert!(keys.iter().all(|k| k.starts_with(&history_prefix("AST.A1"))));
    }

    #[test]
    fn system_keys_are_reserved() {
        for key in [SETTINGS_KEY, CONTRACT_KEY, RECENT_KEY] {
            assert!(key.starts_with(SYSTEM_ROOT));
        }
        assert!(is_reserved(SETTINGS_KEY));
        assert!(is_reserved(HISTORY_ROOT));
        assert!(!is_reserved(&current_key("AST.", "A1")));
    }
}
