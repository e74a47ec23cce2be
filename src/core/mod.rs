//! Core data types.
//!
//! Addressing, rows and identity. Nothing in here performs I/O.

pub mod category;
pub mod entry;
pub mod identity;

// Re-export core types
pub use category::{Category, QueryKind, Slot, Window, CATEGORY_COUNT, LEVEL_COUNT, SLOT_COUNT};
pub use entry::{RankingSlice, ScoreEntry, MAX_TOP_ENTRIES, SELF_INDEX};
pub use identity::{PlayerId, PlayerIdentity};
