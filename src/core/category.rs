//! Ranking Categories and Windows
//!
//! Fixed-shape addressing for the 74 ranking series: 37 categories
//! (one global score, 36 level completion times) times two windows.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Number of levels with a completion-time leaderboard.
pub const LEVEL_COUNT: usize = 36;

/// Total number of ranking categories (levels + global score).
pub const CATEGORY_COUNT: usize = LEVEL_COUNT + 1;

/// Total number of (category, window) slots.
pub const SLOT_COUNT: usize = CATEGORY_COUNT * Window::ALL.len();

/// Storage index of the global score category.
pub const GLOBAL_SCORE_INDEX: usize = LEVEL_COUNT;

// =============================================================================
// CATEGORY
// =============================================================================

/// One ranking series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Overall best score.
    GlobalScore,
    /// Completion time for a level (0-based).
    LevelTime(u8),
}

impl Category {
    /// Create a level category, `None` if the level is out of range.
    pub fn level(level: usize) -> Option<Self> {
        if level < LEVEL_COUNT {
            Some(Category::LevelTime(level as u8))
        } else {
            None
        }
    }

    /// Resolve a storage index back to a category.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            GLOBAL_SCORE_INDEX => Some(Category::GlobalScore),
            i => Self::level(i),
        }
    }

    /// Storage index: levels are `0..36`, the global score is `36`.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Category::GlobalScore => GLOBAL_SCORE_INDEX,
            Category::LevelTime(level) => level as usize,
        }
    }

    /// Whether the category addresses a real series.
    ///
    /// `LevelTime` can be constructed directly with an out-of-range level;
    /// every engine entry point checks this before touching state.
    #[inline]
    pub fn is_valid(self) -> bool {
        match self {
            Category::GlobalScore => true,
            Category::LevelTime(level) => (level as usize) < LEVEL_COUNT,
        }
    }

    /// Iterate every valid category, levels first.
    pub fn all() -> impl Iterator<Item = Category> {
        (0..CATEGORY_COUNT).filter_map(Category::from_index)
    }

    /// Remote leaderboard identifier.
    pub fn leaderboard_id(self) -> String {
        match self {
            Category::GlobalScore => "leaderboard_scores".to_string(),
            Category::LevelTime(level) => format!("leaderboard_level{:02}time", level as usize + 1),
        }
    }

    /// Higher values rank first for scores, lower values for times.
    #[inline]
    pub fn higher_is_better(self) -> bool {
        matches!(self, Category::GlobalScore)
    }

    /// Check whether `candidate` beats `current` in this category.
    pub fn is_improvement(self, candidate: i64, current: Option<i64>) -> bool {
        match current {
            None => true,
            Some(current) if self.higher_is_better() => candidate > current,
            Some(current) => candidate < current,
        }
    }

    /// Durable key for the submission flag.
    pub fn submitted_key(self) -> String {
        format!("submitted:{}", self.index())
    }

    /// Durable key for the local best value.
    pub fn best_key(self) -> String {
        format!("best:{}", self.index())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::GlobalScore => write!(f, "global"),
            Category::LevelTime(level) => write!(f, "level{:02}", *level as usize + 1),
        }
    }
}

// =============================================================================
// WINDOW
// =============================================================================

/// Time scope of a ranking series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Window {
    /// Every score ever submitted.
    AllTime,
    /// Scores submitted in the current week.
    Weekly,
}

impl Window {
    /// Both windows, in dispatch order.
    pub const ALL: [Window; 2] = [Window::AllTime, Window::Weekly];

    /// Index into per-window arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Window::AllTime => 0,
            Window::Weekly => 1,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::AllTime => write!(f, "all-time"),
            Window::Weekly => write!(f, "weekly"),
        }
    }
}

// =============================================================================
// SLOT
// =============================================================================

/// One (category, window) cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Ranking category.
    pub category: Category,
    /// Time window.
    pub window: Window,
}

impl Slot {
    /// Create a slot.
    pub const fn new(category: Category, window: Window) -> Self {
        Self { category, window }
    }

    /// Dense index in `0..SLOT_COUNT`, `None` for an invalid category.
    pub fn index(self) -> Option<usize> {
        if self.category.is_valid() {
            Some(self.category.index() * Window::ALL.len() + self.window.index())
        } else {
            None
        }
    }

    /// Iterate all 74 slots.
    pub fn all() -> impl Iterator<Item = Slot> {
        Category::all().flat_map(|c| Window::ALL.into_iter().map(move |w| Slot::new(c, w)))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.window)
    }
}

/// Which remote read produced an outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Top-N list.
    Top,
    /// Current player's own standing.
    SelfEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_index_roundtrip() {
        for category in Category::all() {
            assert_eq!(Category::from_index(category.index()), Some(category));
        }
        assert_eq!(Category::all().count(), CATEGORY_COUNT);
        assert_eq!(Category::from_index(CATEGORY_COUNT), None);
    }

    #[test]
    fn test_level_bounds() {
        assert!(Category::level(35).is_some());
        assert!(Category::level(36).is_none());
        assert!(!Category::LevelTime(36).is_valid());
        assert_eq!(Slot::new(Category::LevelTime(200), Window::Weekly).index(), None);
    }

    #[test]
    fn test_leaderboard_ids() {
        assert_eq!(Category::GlobalScore.leaderboard_id(), "leaderboard_scores");
        assert_eq!(Category::LevelTime(0).leaderboard_id(), "leaderboard_level01time");
        assert_eq!(Category::LevelTime(35).leaderboard_id(), "leaderboard_level36time");
    }

    #[test]
    fn test_slot_indices_are_dense() {
        let mut seen = vec![false; SLOT_COUNT];
        for slot in Slot::all() {
            let idx = slot.index().unwrap();
            assert!(!seen[idx]);
            seen[idx] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_improvement_direction() {
        assert!(Category::GlobalScore.is_improvement(1500, Some(1000)));
        assert!(!Category::GlobalScore.is_improvement(900, Some(1000)));
        assert!(Category::LevelTime(3).is_improvement(40_000, Some(42_000)));
        assert!(!Category::LevelTime(3).is_improvement(50_000, Some(42_000)));
        assert!(Category::LevelTime(3).is_improvement(50_000, None));
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(Category::GlobalScore.submitted_key(), "submitted:36");
        assert_eq!(Category::LevelTime(4).best_key(), "best:4");
    }
}
