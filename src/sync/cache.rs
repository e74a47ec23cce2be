//! Score Cache
//!
//! Latest known rows and readiness for all 74 slots. Each slot sits behind
//! its own lock so completions for different slots never contend.
//!
//! Contents survive a refresh; only readiness is reset, so callers keep
//! seeing the previous answer until the new one lands.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::core::category::{Category, QueryKind, Slot, Window, SLOT_COUNT, LEVEL_COUNT};
use crate::core::entry::{RankingSlice, ScoreEntry, UNKNOWN_RANK};

/// Why a completion was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Slot does not exist.
    Invalid,
    /// The slot has moved on to a newer refresh cycle.
    Stale,
}

/// One slot's rows and readiness, handed to [`ScoreCache::complete`] writers.
#[derive(Debug, Default)]
pub struct SlotCell {
    slice: RankingSlice,
    /// `None` until the first self query of the process completes.
    self_rank: Option<u64>,
    /// Cycle the readiness flags belong to.
    generation: u64,
    top_ready: bool,
    self_ready: bool,
}

impl SlotCell {
    fn ready_flag(&mut self, kind: QueryKind) -> &mut bool {
        match kind {
            QueryKind::Top => &mut self.top_ready,
            QueryKind::SelfEntry => &mut self.self_ready,
        }
    }

    /// Overwrite the top list. Returns `true` if the list is non-empty.
    pub fn store_top(&mut self, entries: Vec<ScoreEntry>, limit: usize) -> bool {
        self.slice.set_top(entries, limit);
        self.slice.top_len() > 0
    }

    /// Overwrite the player's own row and rank.
    pub fn store_own(&mut self, entry: ScoreEntry) {
        self.self_rank = entry.rank;
        self.slice.set_own(entry);
    }

    /// The self query failed: keep the row, set the rank to the unknown sentinel.
    pub fn mark_own_unknown(&mut self) {
        self.self_rank = Some(UNKNOWN_RANK);
        if let Some(own) = self.slice.own_mut() {
            own.rank = Some(UNKNOWN_RANK);
        }
    }
}

/// In-memory ranking cache with per-slot readiness.
#[derive(Debug)]
pub struct ScoreCache {
    cells: Vec<Mutex<SlotCell>>,
    generation: AtomicU64,
    time_scores_changed: AtomicBool,
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreCache {
    /// Create an empty cache. Nothing is ready.
    pub fn new() -> Self {
        Self {
            cells: (0..SLOT_COUNT).map(|_| Mutex::new(SlotCell::default())).collect(),
            generation: AtomicU64::new(0),
            time_scores_changed: AtomicBool::new(false),
        }
    }

    fn with_cell<R>(&self, slot: Slot, f: impl FnOnce(&mut SlotCell) -> R) -> Option<R> {
        let index = slot.index()?;
        let mut cell = self.cells[index].lock().unwrap_or_else(|e| e.into_inner());
        Some(f(&mut cell))
    }

    // =========================================================================
    // CYCLE BOOKKEEPING
    // =========================================================================

    /// Start a new refresh cycle: move every slot to the new generation with
    /// readiness cleared, clear the change flag, and return the generation.
    ///
    /// Each slot switches under its own lock, so a completion from the old
    /// cycle lands either wholly before the switch or is rejected after it.
    pub fn begin_cycle(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        for cell in &self.cells {
            let mut cell = cell.lock().unwrap_or_else(|e| e.into_inner());
            cell.generation = generation;
            cell.top_ready = false;
            cell.self_ready = false;
        }
        // After the switch: an old completion can no longer raise it.
        self.time_scores_changed.store(false, Ordering::SeqCst);
        generation
    }

    /// Generation of the most recent cycle (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Apply a completed query to `slot` and mark `kind` ready, in one step
    /// under the slot lock.
    ///
    /// With `Some(generation)` the completion is rejected unless the slot still
    /// belongs to that cycle. A query already marked ready stays ready; the
    /// write still applies.
    pub fn complete<R>(
        &self,
        slot: Slot,
        kind: QueryKind,
        generation: Option<u64>,
        write: impl FnOnce(&mut SlotCell) -> R,
    ) -> Result<R, Rejected> {
        let index = slot.index().ok_or(Rejected::Invalid)?;
        let mut cell = self.cells[index].lock().unwrap_or_else(|e| e.into_inner());
        if generation.is_some_and(|g| g != cell.generation) {
            return Err(Rejected::Stale);
        }
        let result = write(&mut cell);
        *cell.ready_flag(kind) = true;
        Ok(result)
    }

    /// Check whether a query finished in the current cycle.
    pub fn is_ready(&self, slot: Slot, kind: QueryKind) -> bool {
        self.with_cell(slot, |cell| *cell.ready_flag(kind)).unwrap_or(false)
    }

    /// Both the top list and the self entry for the global score are in.
    pub fn is_global_ready(&self, window: Window) -> bool {
        let slot = Slot::new(Category::GlobalScore, window);
        self.is_ready(slot, QueryKind::Top) && self.is_ready(slot, QueryKind::SelfEntry)
    }

    /// Every level's top query is in, for both windows.
    pub fn is_all_level_times_ready(&self) -> bool {
        (0..LEVEL_COUNT).all(|level| {
            Window::ALL.iter().all(|window| {
                self.is_ready(Slot::new(Category::LevelTime(level as u8), *window), QueryKind::Top)
            })
        })
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Ranked row, or the unknown sentinel.
    pub fn top_entry(&self, slot: Slot, rank: usize) -> ScoreEntry {
        self.with_cell(slot, |cell| cell.slice.top(rank).cloned())
            .flatten()
            .unwrap_or_else(ScoreEntry::unknown)
    }

    /// Number of ranked rows held for a slot.
    pub fn top_len(&self, slot: Slot) -> usize {
        self.with_cell(slot, |cell| cell.slice.top_len()).unwrap_or(0)
    }

    /// The player's own row, or the unknown sentinel.
    pub fn self_entry(&self, slot: Slot) -> ScoreEntry {
        self.with_cell(slot, |cell| cell.slice.own().cloned())
            .flatten()
            .unwrap_or_else(ScoreEntry::unknown)
    }

    /// The player's rank: `None` before any answer, `Some(0)` after a failure.
    pub fn self_rank(&self, slot: Slot) -> Option<u64> {
        self.with_cell(slot, |cell| cell.self_rank).flatten()
    }

    /// Full ranking view of a slot.
    pub fn slice(&self, slot: Slot) -> RankingSlice {
        self.with_cell(slot, |cell| cell.slice.clone()).unwrap_or_default()
    }

    // =========================================================================
    // CHANGE FLAG
    // =========================================================================

    /// Raise the one-shot "time scores changed" flag.
    pub fn raise_change_flag(&self) {
        self.time_scores_changed.store(true, Ordering::SeqCst);
    }

    /// Read and clear the change flag in one step.
    pub fn drain_change_flag(&self) -> bool {
        self.time_scores_changed.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(window: Window) -> Slot {
        Slot::new(Category::GlobalScore, window)
    }

    fn mark(cache: &ScoreCache, slot: Slot, kind: QueryKind) {
        cache.complete(slot, kind, None, |_| ()).unwrap();
    }

    #[test]
    fn test_empty_cache_returns_sentinels() {
        let cache = ScoreCache::new();
        let slot = Slot::new(Category::LevelTime(5), Window::Weekly);
        assert!(cache.top_entry(slot, 0).is_unknown());
        assert!(cache.self_entry(slot).is_unknown());
        assert_eq!(cache.self_rank(slot), None);
        assert!(!cache.is_ready(slot, QueryKind::Top));
    }

    #[test]
    fn test_invalid_slot_is_harmless() {
        let cache = ScoreCache::new();
        let bad = Slot::new(Category::LevelTime(77), Window::AllTime);
        let result = cache.complete(bad, QueryKind::Top, None, |cell| {
            cell.store_top(vec![ScoreEntry::new("x", 1, None)], 1)
        });
        assert_eq!(result, Err(Rejected::Invalid));
        assert!(!cache.is_ready(bad, QueryKind::Top));
        assert!(cache.top_entry(bad, 0).is_unknown());
    }

    #[test]
    fn test_readiness_resets_per_cycle() {
        let cache = ScoreCache::new();
        let slot = global(Window::AllTime);

        let generation = cache.begin_cycle();
        cache.complete(slot, QueryKind::Top, Some(generation), |_| ()).unwrap();
        assert!(cache.is_ready(slot, QueryKind::Top));
        assert!(!cache.is_ready(slot, QueryKind::SelfEntry));

        cache.begin_cycle();
        assert!(!cache.is_ready(slot, QueryKind::Top));
    }

    #[test]
    fn test_old_cycle_completion_rejected() {
        let cache = ScoreCache::new();
        let slot = Slot::new(Category::LevelTime(3), Window::Weekly);
        let old = cache.begin_cycle();
        let current = cache.begin_cycle();

        let result = cache.complete(slot, QueryKind::Top, Some(old), |cell| {
            cell.store_top(vec![ScoreEntry::new("Old", 99, Some(1))], 1)
        });
        assert_eq!(result, Err(Rejected::Stale));
        assert!(!cache.is_ready(slot, QueryKind::Top));
        assert!(cache.top_entry(slot, 0).is_unknown());

        // The slot's own callback still makes the transition.
        cache.complete(slot, QueryKind::Top, Some(current), |_| ()).unwrap();
        assert!(cache.is_ready(slot, QueryKind::Top));
    }

    #[test]
    fn test_cycle_switch_races_with_old_completions() {
        let cache = ScoreCache::new();
        let slots: Vec<Slot> = Slot::all().collect();

        for _ in 0..50 {
            let old = cache.begin_cycle();
            let current = std::thread::scope(|s| {
                s.spawn(|| {
                    for slot in &slots {
                        let _ = cache.complete(*slot, QueryKind::Top, Some(old), |cell| {
                            cell.store_top(vec![ScoreEntry::new("Old", 1, Some(1))], 1);
                            cache.raise_change_flag();
                        });
                    }
                });
                cache.begin_cycle()
            });

            // Whatever interleaving happened, no old completion counts for the new cycle.
            assert!(slots.iter().all(|slot| !cache.is_ready(*slot, QueryKind::Top)));
            assert!(!cache.drain_change_flag());
            assert_eq!(cache.generation(), current);
        }
    }

    #[test]
    fn test_global_ready_needs_both_queries() {
        let cache = ScoreCache::new();
        let slot = global(Window::Weekly);

        mark(&cache, slot, QueryKind::Top);
        assert!(!cache.is_global_ready(Window::Weekly));
        mark(&cache, slot, QueryKind::SelfEntry);
        assert!(cache.is_global_ready(Window::Weekly));
        assert!(!cache.is_global_ready(Window::AllTime));
    }

    #[test]
    fn test_all_level_times_ready() {
        let cache = ScoreCache::new();
        for slot in Slot::all().filter(|s| s.category != Category::GlobalScore) {
            assert!(!cache.is_all_level_times_ready());
            mark(&cache, slot, QueryKind::Top);
        }
        assert!(cache.is_all_level_times_ready());
    }

    #[test]
    fn test_store_top_reports_populated() {
        let cache = ScoreCache::new();
        let slot = Slot::new(Category::LevelTime(2), Window::AllTime);
        let store = |entries: Vec<ScoreEntry>| {
            cache.complete(slot, QueryKind::Top, None, |cell| cell.store_top(entries, 1)).unwrap()
        };

        assert!(store(vec![ScoreEntry::new("Ann", 42, Some(1))]));
        assert!(store(vec![ScoreEntry::new("Ann", 42, Some(1))]));
        assert!(!store(Vec::new()));
        assert!(cache.top_entry(slot, 0).is_unknown());
    }

    #[test]
    fn test_self_failure_keeps_row_with_unknown_rank() {
        let cache = ScoreCache::new();
        let slot = global(Window::AllTime);
        let kind = QueryKind::SelfEntry;

        cache.complete(slot, kind, None, |cell| cell.mark_own_unknown()).unwrap();
        assert_eq!(cache.self_rank(slot), Some(0));
        assert!(cache.self_entry(slot).is_unknown());

        cache
            .complete(slot, kind, None, |cell| cell.store_own(ScoreEntry::new("Me", 1500, Some(12))))
            .unwrap();
        assert_eq!(cache.self_rank(slot), Some(12));

        cache.complete(slot, kind, None, |cell| cell.mark_own_unknown()).unwrap();
        let own = cache.self_entry(slot);
        assert_eq!(own.raw_value, 1500);
        assert_eq!(own.rank, Some(0));
    }

    #[test]
    fn test_change_flag_drains_once() {
        let cache = ScoreCache::new();
        assert!(!cache.drain_change_flag());
        cache.raise_change_flag();
        assert!(cache.drain_change_flag());
        assert!(!cache.drain_change_flag());
    }

    #[test]
    fn test_begin_cycle_bumps_generation() {
        let cache = ScoreCache::new();
        assert_eq!(cache.generation(), 0);
        assert_eq!(cache.begin_cycle(), 1);
        assert_eq!(cache.begin_cycle(), 2);
        assert_eq!(cache.generation(), 2);
    }
}
