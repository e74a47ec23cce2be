//! Score Entries
//!
//! Leaderboard rows as seen by the engine. An empty entry doubles as the
//! "unknown" sentinel returned for anything not yet populated.

use serde::{Serialize, Deserialize};

/// Maximum number of ranked entries kept for the global score list.
pub const MAX_TOP_ENTRIES: usize = 5;

/// Position reserved for the current player's own entry in a ranking slice.
pub const SELF_INDEX: usize = MAX_TOP_ENTRIES;

/// Rank reported when the self query failed.
pub const UNKNOWN_RANK: u64 = 0;

/// One leaderboard row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Display name of the score holder.
    pub holder_name: String,
    /// Raw value (points, or milliseconds for level times).
    pub raw_value: i64,
    /// 1-based rank, when the remote reported one.
    pub rank: Option<u64>,
}

impl ScoreEntry {
    /// Create an entry.
    pub fn new(holder_name: impl Into<String>, raw_value: i64, rank: Option<u64>) -> Self {
        Self {
            holder_name: holder_name.into(),
            raw_value,
            rank,
        }
    }

    /// The "unknown" sentinel: empty name, zero value, no rank.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Check if this is the sentinel.
    pub fn is_unknown(&self) -> bool {
        self.holder_name.is_empty() && self.raw_value == 0 && self.rank.is_none()
    }
}

// =============================================================================
// RANKING SLICE
// =============================================================================

/// Cached ranking view for one slot.
///
/// Holds at most `MAX_TOP_ENTRIES` ranked rows plus the player's own row,
/// addressed as index `SELF_INDEX` whatever the player's real rank is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RankingSlice {
    top: Vec<ScoreEntry>,
    own: Option<ScoreEntry>,
}

impl RankingSlice {
    /// Create an empty slice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the ranked rows, keeping at most `limit` (capped at `MAX_TOP_ENTRIES`).
    pub fn set_top(&mut self, mut entries: Vec<ScoreEntry>, limit: usize) {
        entries.truncate(limit.min(MAX_TOP_ENTRIES));
        self.top = entries;
    }

    /// Replace the player's own row.
    pub fn set_own(&mut self, entry: ScoreEntry) {
        self.own = Some(entry);
    }

    /// Ranked row at `rank` (0-based position in the list).
    pub fn top(&self, rank: usize) -> Option<&ScoreEntry> {
        self.top.get(rank)
    }

    /// Number of ranked rows held.
    pub fn top_len(&self) -> usize {
        self.top.len()
    }

    /// The player's own row.
    pub fn own(&self) -> Option<&ScoreEntry> {
        self.own.as_ref()
    }

    /// Mutable access to the player's own row.
    pub fn own_mut(&mut self) -> Option<&mut ScoreEntry> {
        self.own.as_mut()
    }

    /// Address rows by slice position: `0..MAX_TOP_ENTRIES` are ranked rows,
    /// `SELF_INDEX` is the player's own row.
    pub fn get(&self, index: usize) -> Option<&ScoreEntry> {
        if index == SELF_INDEX {
            self.own()
        } else if index < MAX_TOP_ENTRIES {
            self.top(index)
        } else {
            None
        }
    }

    /// Total rows held, never more than `MAX_TOP_ENTRIES + 1`.
    pub fn len(&self) -> usize {
        self.top.len() + usize::from(self.own.is_some())
    }

    /// Check if no rows are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: usize) -> Vec<ScoreEntry> {
        (0..n)
            .map(|i| ScoreEntry::new(format!("p{}", i), 1000 - i as i64, Some(i as u64 + 1)))
            .collect()
    }

    #[test]
    fn test_unknown_sentinel() {
        let e = ScoreEntry::unknown();
        assert!(e.is_unknown());
        assert_eq!(e.holder_name, "");
        assert_eq!(e.raw_value, 0);
        assert_eq!(e.rank, None);
    }

    #[test]
    fn test_slice_caps_at_six_rows() {
        let mut slice = RankingSlice::new();
        slice.set_top(entries(9), 5);
        slice.set_own(ScoreEntry::new("me", 10, Some(420)));

        assert_eq!(slice.top_len(), MAX_TOP_ENTRIES);
        assert_eq!(slice.len(), MAX_TOP_ENTRIES + 1);
        assert_eq!(slice.get(SELF_INDEX).unwrap().holder_name, "me");
        assert_eq!(slice.get(0).unwrap().holder_name, "p0");
        assert!(slice.get(SELF_INDEX + 1).is_none());
    }

    #[test]
    fn test_self_index_reserved_when_list_short() {
        let mut slice = RankingSlice::new();
        slice.set_top(entries(2), 5);
        slice.set_own(ScoreEntry::new("me", 998, Some(3)));

        assert!(slice.get(2).is_none());
        assert_eq!(slice.get(SELF_INDEX).unwrap().rank, Some(3));
    }

    #[test]
    fn test_set_top_respects_limit() {
        let mut slice = RankingSlice::new();
        slice.set_top(entries(3), 1);
        assert_eq!(slice.top_len(), 1);
    }
}
