//! Sync Session
//!
//! The one owned engine instance callers talk to. Starting it loads the
//! durable state and spawns the aggregator; everything after that is
//! non-blocking. Callers start cycles, then poll readiness and read the
//! cache. Reads before readiness return sentinels.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::core::category::{Category, QueryKind, Slot, Window};
use crate::core::entry::{RankingSlice, ScoreEntry};
use crate::core::identity::PlayerIdentity;
use crate::remote::RemoteLeaderboard;
use crate::storage::{KeyValueStore, LocalRecords, SubmissionStateStore};
use crate::sync::aggregator::ResultAggregator;
use crate::sync::cache::ScoreCache;
use crate::sync::gate::SessionGate;
use crate::sync::scheduler::QueryScheduler;
use crate::sync::submission::{SubmissionCoordinator, SubmissionOutcome};

/// Leaderboard sync engine.
pub struct SyncSession {
    config: SyncConfig,
    gate: Arc<SessionGate>,
    cache: Arc<ScoreCache>,
    flags: Arc<SubmissionStateStore>,
    records: Arc<LocalRecords>,
    scheduler: QueryScheduler,
    coordinator: Arc<SubmissionCoordinator>,
    aggregator: JoinHandle<()>,
}

impl SyncSession {
    /// Load durable state from `store` and start the engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: SyncConfig,
        remote: Arc<dyn RemoteLeaderboard>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let gate = Arc::new(SessionGate::new());
        let cache = Arc::new(ScoreCache::new());
        let flags = Arc::new(SubmissionStateStore::load(store.clone()));
        let records = Arc::new(LocalRecords::load(store, &config.default_display_name));

        let (outcomes, aggregator) = ResultAggregator::new(cache.clone(), &config).spawn();
        let scheduler = QueryScheduler::new(remote.clone(), outcomes, cache.clone(), gate.clone(), &config);
        let coordinator = Arc::new(SubmissionCoordinator::new(
            remote,
            flags.clone(),
            records.clone(),
            gate.clone(),
        ));

        let pending = flags.pending();
        if !pending.is_empty() {
            info!("{} categories have unsubmitted bests", pending.len());
        }

        Self {
            config,
            gate,
            cache,
            flags,
            records,
            scheduler,
            coordinator,
            aggregator,
        }
    }

    /// Configuration in effect.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // =========================================================================
    // SESSION LIFECYCLE
    // =========================================================================

    /// The remote reports a signed-in player. Caches the display name,
    /// retries pending submissions and starts a cached read.
    ///
    /// The returned handle resolves to the retry results.
    pub fn on_session_established(
        &self,
        identity: PlayerIdentity,
    ) -> JoinHandle<Vec<(Category, SubmissionOutcome)>> {
        info!("Session established for player {}", identity.player_id.short_hex());

        if self.records.has_default_display_name() {
            if let Some(name) = identity.display_name.as_deref() {
                self.records.set_display_name(name);
            }
        }

        self.gate.establish(identity);
        let retry = self.retry_pending();
        self.scheduler.schedule_full_refresh(false);
        retry
    }

    /// The remote reports the session is gone. Dispatch stops; flags and
    /// readiness stay as they are.
    pub fn on_session_lost(&self) {
        info!("Session lost");
        self.gate.clear();
        self.scheduler.cancel();
    }

    /// Check if a session is established.
    pub fn has_session(&self) -> bool {
        self.gate.is_active()
    }

    // =========================================================================
    // REFRESH
    // =========================================================================

    /// Start a cycle that bypasses remote caches and retry anything still
    /// owed. Returns immediately; `false` if there is no session.
    pub fn refresh(&self) -> bool {
        self.start_cycle(true)
    }

    /// Same as [`refresh`](Self::refresh), letting the remote serve cached answers.
    pub fn read_cached(&self) -> bool {
        self.start_cycle(false)
    }

    fn start_cycle(&self, force_refresh: bool) -> bool {
        if !self.scheduler.schedule_full_refresh(force_refresh) {
            return false;
        }
        // Detached: results are visible through the flags.
        drop(self.retry_pending());
        true
    }

    /// Wait until the current cycle has sent every request.
    pub async fn dispatch_complete(&self) {
        self.scheduler.join().await;
    }

    /// Global score list and self entry for `window` are both in.
    pub fn is_global_ready(&self, window: Window) -> bool {
        self.cache.is_global_ready(window)
    }

    /// All 72 level slots are in.
    pub fn is_all_level_times_ready(&self) -> bool {
        self.cache.is_all_level_times_ready()
    }

    /// Check a single query's readiness.
    pub fn is_slot_ready(&self, category: Category, window: Window, kind: QueryKind) -> bool {
        self.cache.is_ready(Slot::new(category, window), kind)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Ranked row `rank` (0-based), or the sentinel.
    pub fn top_entry(&self, category: Category, window: Window, rank: usize) -> ScoreEntry {
        self.cache.top_entry(Slot::new(category, window), rank)
    }

    /// Every ranked row held for a slot.
    pub fn top_entries(&self, category: Category, window: Window) -> Vec<ScoreEntry> {
        let slot = Slot::new(category, window);
        (0..self.cache.top_len(slot)).map(|rank| self.cache.top_entry(slot, rank)).collect()
    }

    /// The player's own row, or the sentinel.
    pub fn self_entry(&self, category: Category, window: Window) -> ScoreEntry {
        self.cache.self_entry(Slot::new(category, window))
    }

    /// The player's global rank: `None` before any answer, `Some(0)` when unknown.
    pub fn player_rank(&self, window: Window) -> Option<u64> {
        self.cache.self_rank(Slot::new(Category::GlobalScore, window))
    }

    /// Full ranking view of a slot.
    pub fn ranking(&self, category: Category, window: Window) -> RankingSlice {
        self.cache.slice(Slot::new(category, window))
    }

    /// Consume the "time scores changed" edge.
    pub fn drain_change_flag(&self) -> bool {
        self.cache.drain_change_flag()
    }

    /// Cached display name.
    pub fn player_display_name(&self) -> String {
        self.records.display_name()
    }

    /// Local best for a category.
    pub fn local_best(&self, category: Category) -> Option<i64> {
        self.records.best(category)
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Report a score. A best goes Pending before this returns; a remote
    /// submission is started only when a session exists.
    pub fn report(
        &self,
        category: Category,
        value: i64,
        is_best: bool,
    ) -> Option<JoinHandle<SubmissionOutcome>> {
        if !self.coordinator.record(category, value, is_best) {
            return None;
        }
        if !self.gate.is_active() {
            debug!("No session, {} for {} left pending", value, category);
            return None;
        }

        let coordinator = self.coordinator.clone();
        Some(tokio::spawn(async move {
            coordinator.submit(category, value, is_best).await
        }))
    }

    /// Report a global score.
    pub fn report_score(&self, score: i64, is_best: bool) -> Option<JoinHandle<SubmissionOutcome>> {
        self.report(Category::GlobalScore, score, is_best)
    }

    /// Report a level completion time in seconds. Submitted in milliseconds.
    pub fn report_level_time(
        &self,
        level: usize,
        seconds: u32,
        is_best: bool,
    ) -> Option<JoinHandle<SubmissionOutcome>> {
        let category = Category::level(level)?;
        self.report(category, i64::from(seconds) * 1000, is_best)
    }

    /// Retry every Pending category in the background.
    pub fn retry_pending(&self) -> JoinHandle<Vec<(Category, SubmissionOutcome)>> {
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move { coordinator.retry_pending().await })
    }

    /// Check if `category` has nothing owed.
    pub fn is_submitted(&self, category: Category) -> bool {
        self.flags.get(category)
    }

    /// Categories still owed to the remote.
    pub fn pending_submissions(&self) -> Vec<Category> {
        self.flags.pending()
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    /// Stop background work. In-flight requests are abandoned.
    pub fn shutdown(&self) {
        self.scheduler.cancel();
        self.aggregator.abort();
        debug!("Sync session shut down");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
