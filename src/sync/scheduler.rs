//! Query Scheduler
//!
//! Issues the full read batch for a refresh cycle:
//!
//! ```text
//! t=0      global top + global self, both windows (4 requests, unpaced)
//! t=0      level 01 all-time + weekly
//! t=500ms  level 02 all-time + weekly
//! ...
//! t=17.5s  level 36 all-time + weekly
//! ```
//!
//! Pacing is a send-side throttle only: the loop never waits for answers.
//! Each request runs as its own task and reports to the aggregator channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::config::SyncConfig;
use crate::core::category::{Category, Slot, Window, LEVEL_COUNT};
use crate::remote::{Collection, RemoteLeaderboard};
use crate::sync::aggregator::{QueryOutcome, QueryResult};
use crate::sync::cache::ScoreCache;
use crate::sync::gate::SessionGate;

/// Everything a single request task needs.
#[derive(Clone)]
struct Dispatcher {
    remote: Arc<dyn RemoteLeaderboard>,
    outcomes: mpsc::UnboundedSender<QueryOutcome>,
    collection: Collection,
    generation: u64,
    force_refresh: bool,
}

impl Dispatcher {
    fn top(&self, category: Category, window: Window, limit: usize) {
        let d = self.clone();
        tokio::spawn(async move {
            let result = d
                .remote
                .load_top_entries(category, window, d.collection, limit, d.force_refresh)
                .await;
            d.report(Slot::new(category, window), QueryResult::Top(result));
        });
    }

    fn own(&self, category: Category, window: Window) {
        let d = self.clone();
        tokio::spawn(async move {
            let result = d.remote.load_self_entry(category, window, d.collection).await;
            d.report(Slot::new(category, window), QueryResult::SelfEntry(result));
        });
    }

    fn report(&self, slot: Slot, result: QueryResult) {
        let outcome = QueryOutcome {
            generation: self.generation,
            slot,
            result,
        };
        if self.outcomes.send(outcome).is_err() {
            debug!("Aggregator closed, dropping outcome for {}", slot);
        }
    }
}

/// Paced dispatcher for refresh cycles.
pub struct QueryScheduler {
    remote: Arc<dyn RemoteLeaderboard>,
    outcomes: mpsc::UnboundedSender<QueryOutcome>,
    cache: Arc<ScoreCache>,
    gate: Arc<SessionGate>,
    level_pacing: Duration,
    global_top_limit: usize,
    level_top_limit: usize,
    collection: Collection,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl QueryScheduler {
    /// Create a scheduler reporting to `outcomes`.
    pub fn new(
        remote: Arc<dyn RemoteLeaderboard>,
        outcomes: mpsc::UnboundedSender<QueryOutcome>,
        cache: Arc<ScoreCache>,
        gate: Arc<SessionGate>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            remote,
            outcomes,
            cache,
            gate,
            level_pacing: config.level_pacing,
            global_top_limit: config.global_top_limit,
            level_top_limit: config.level_top_limit,
            collection: config.collection,
            current: Mutex::new(None),
        }
    }

    /// Start a refresh cycle. The most recent call wins: a dispatch loop
    /// still running is stopped (its in-flight requests are not), readiness
    /// is reset, and issuing restarts from the beginning.
    ///
    /// Returns `false` without touching anything when no session exists.
    pub fn schedule_full_refresh(&self, force_refresh: bool) -> bool {
        if !self.gate.is_active() {
            debug!("No session, skipping refresh");
            return false;
        }

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.take() {
            if !previous.is_finished() {
                debug!("Superseding running dispatch loop");
                previous.abort();
            }
        }

        let generation = self.cache.begin_cycle();
        let dispatcher = Dispatcher {
            remote: self.remote.clone(),
            outcomes: self.outcomes.clone(),
            collection: self.collection,
            generation,
            force_refresh,
        };

        for window in Window::ALL {
            dispatcher.top(Category::GlobalScore, window, self.global_top_limit);
            dispatcher.own(Category::GlobalScore, window);
        }

        *current = Some(tokio::spawn(Self::run_level_dispatch(
            dispatcher,
            self.gate.clone(),
            self.level_pacing,
            self.level_top_limit,
        )));

        info!("Refresh cycle {} started (force_refresh={})", generation, force_refresh);
        true
    }

    #[instrument(skip(dispatcher, gate), fields(generation = dispatcher.generation))]
    async fn run_level_dispatch(
        dispatcher: Dispatcher,
        gate: Arc<SessionGate>,
        pacing: Duration,
        limit: usize,
    ) {
        for level in 0..LEVEL_COUNT {
            if level > 0 {
                tokio::time::sleep(pacing).await;
            }
            if !gate.is_active() {
                info!("Session lost, stopping dispatch at level {}", level + 1);
                return;
            }

            let category = Category::LevelTime(level as u8);
            for window in Window::ALL {
                dispatcher.top(category, window, limit);
            }
        }
        debug!("All level queries dispatched");
    }

    /// Check if a dispatch loop is still sending.
    pub fn is_dispatching(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }

    /// Wait for the current dispatch loop to finish sending.
    pub async fn join(&self) {
        let handle = self.current.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Stop the current dispatch loop. In-flight requests still complete.
    pub fn cancel(&self) {
        if let Some(handle) = self.current.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}
