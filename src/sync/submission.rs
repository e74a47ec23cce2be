//! Submission Coordinator
//!
//! Per-category two-state machine over the durable flag:
//!
//! ```text
//!            report best
//!   Settled ─────────────► Pending
//!      ▲                     │
//!      └─────────────────────┘
//!        ack for the current best
//! ```
//!
//! Failed or unanswered submissions leave the category Pending; the next
//! `retry_pending` (run on every session start) submits it again.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::core::category::Category;
use crate::remote::{RemoteError, RemoteLeaderboard, SubmitAck};
use crate::storage::{LocalRecords, SubmissionStateStore};
use crate::sync::gate::SessionGate;

/// Why a submission was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Value not positive or category out of range.
    InvalidArgument,
    /// Nobody is signed in.
    NoSession,
    /// A submission for this category is already outstanding.
    InFlight,
}

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// No remote call was made.
    Skipped(SkipReason),
    /// The service confirmed the score and the category is now Settled.
    Settled(SubmitAck),
    /// The service confirmed the score, but the flag was left alone
    /// (not a best, or a newer best was reported meanwhile).
    Acknowledged(SubmitAck),
    /// The call failed; the category stays Pending.
    Failed(RemoteError),
}

/// Counts outstanding submissions per category; released on drop so an
/// aborted task cannot leave a category stuck.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<BTreeMap<Category, usize>>,
    category: Category,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = in_flight.get_mut(&self.category) {
            *count -= 1;
            if *count == 0 {
                in_flight.remove(&self.category);
            }
        }
    }
}

/// Decides when to submit and settles flags on confirmed acks.
pub struct SubmissionCoordinator {
    remote: Arc<dyn RemoteLeaderboard>,
    flags: Arc<SubmissionStateStore>,
    records: Arc<LocalRecords>,
    gate: Arc<SessionGate>,
    in_flight: Mutex<BTreeMap<Category, usize>>,
    /// Held across every best/flag pair so a settle never lands on a newer best.
    transition: Mutex<()>,
}

impl SubmissionCoordinator {
    /// Create a coordinator.
    pub fn new(
        remote: Arc<dyn RemoteLeaderboard>,
        flags: Arc<SubmissionStateStore>,
        records: Arc<LocalRecords>,
        gate: Arc<SessionGate>,
    ) -> Self {
        Self {
            remote,
            flags,
            records,
            gate,
            in_flight: Mutex::new(BTreeMap::new()),
            transition: Mutex::new(()),
        }
    }

    /// Record a reported score. For a best, the local record is updated and
    /// the category goes Pending before this returns.
    ///
    /// Returns `false` for a non-positive value or an invalid category.
    pub fn record(&self, category: Category, value: i64, is_best: bool) -> bool {
        if value <= 0 || !category.is_valid() {
            debug!("Ignoring report of {} for {}", value, category);
            return false;
        }

        if is_best {
            let _transition = self.transition.lock().unwrap_or_else(|e| e.into_inner());
            self.records.set_best(category, value);
            self.flags.set(category, false);
            debug!("{} pending with best {}", category, value);
        }
        true
    }

    fn reserve(&self, category: Category, exclusive: bool) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let count = in_flight.entry(category).or_insert(0);
        if exclusive && *count > 0 {
            return None;
        }
        *count += 1;
        Some(InFlightGuard {
            in_flight: &self.in_flight,
            category,
        })
    }

    /// Check if any submission for `category` is outstanding.
    pub fn is_in_flight(&self, category: Category) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&category)
    }

    /// Submit a value. Callers report first with [`record`](Self::record).
    #[instrument(skip(self))]
    pub async fn submit(&self, category: Category, value: i64, is_best: bool) -> SubmissionOutcome {
        if value <= 0 || !category.is_valid() {
            return SubmissionOutcome::Skipped(SkipReason::InvalidArgument);
        }
        let Some(guard) = self.reserve(category, false) else {
            return SubmissionOutcome::Skipped(SkipReason::InFlight);
        };
        self.submit_reserved(category, value, is_best, guard).await
    }

    async fn submit_reserved(
        &self,
        category: Category,
        value: i64,
        is_best: bool,
        _guard: InFlightGuard<'_>,
    ) -> SubmissionOutcome {
        if !self.gate.is_active() {
            debug!("No session, deferring {} for {}", value, category);
            return SubmissionOutcome::Skipped(SkipReason::NoSession);
        }

        match self.remote.submit_score(category, value).await {
            Ok(ack) => {
                if is_best && self.settle_if_current(category, value) {
                    info!("Submitted {} for {}: settled", value, category);
                    SubmissionOutcome::Settled(ack)
                } else {
                    info!("Submitted {} for {}", value, category);
                    SubmissionOutcome::Acknowledged(ack)
                }
            }
            Err(e) => {
                warn!("Submission of {} for {} failed: {}", value, category, e);
                SubmissionOutcome::Failed(e)
            }
        }
    }

    /// Settle `category` if `value` is still its local best. Returns `false`
    /// and leaves the flag alone otherwise.
    pub fn settle_if_current(&self, category: Category, value: i64) -> bool {
        let _transition = self.transition.lock().unwrap_or_else(|e| e.into_inner());
        if self.records.best(category) != Some(value) {
            return false;
        }
        self.flags.set(category, true);
        true
    }

    /// Local best of a Pending category. Without one nothing is owed, and the
    /// category is settled on the spot.
    fn best_or_settle(&self, category: Category) -> Option<i64> {
        let _transition = self.transition.lock().unwrap_or_else(|e| e.into_inner());
        let best = self.records.best(category).filter(|v| *v > 0);
        if best.is_none() {
            info!("{} pending without a local best, settling", category);
            self.flags.set(category, true);
        }
        best
    }

    /// Re-submit the local best of every Pending category that has no
    /// submission outstanding. A Pending category without a recorded best
    /// owes nothing and is settled directly.
    #[instrument(skip(self))]
    pub async fn retry_pending(&self) -> Vec<(Category, SubmissionOutcome)> {
        if !self.gate.is_active() {
            debug!("No session, not retrying pending submissions");
            return Vec::new();
        }

        let mut attempts = Vec::new();
        for category in self.flags.pending() {
            let Some(best) = self.best_or_settle(category) else {
                continue;
            };
            match self.reserve(category, true) {
                Some(guard) => attempts.push((category, best, guard)),
                None => debug!("{} already in flight, skipping retry", category),
            }
        }

        if attempts.is_empty() {
            return Vec::new();
        }
        info!("Retrying {} pending submissions", attempts.len());

        join_all(attempts.into_iter().map(|(category, best, guard)| async move {
            (category, self.submit_reserved(category, best, true, guard).await)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::PlayerIdentity;
    use crate::remote::InMemoryLeaderboard;
    use crate::storage::{KeyValueStore, MemoryStore};

    struct Harness {
        remote: Arc<InMemoryLeaderboard>,
        backend: Arc<MemoryStore>,
        flags: Arc<SubmissionStateStore>,
        records: Arc<LocalRecords>,
        gate: Arc<SessionGate>,
        coordinator: SubmissionCoordinator,
    }

    fn harness() -> Harness {
        let remote = Arc::new(InMemoryLeaderboard::new());
        let backend = Arc::new(MemoryStore::new());
        let flags = Arc::new(SubmissionStateStore::load(backend.clone()));
        let records = Arc::new(LocalRecords::load(backend.clone(), "Player"));
        let gate = Arc::new(SessionGate::new());
        let coordinator = SubmissionCoordinator::new(remote.clone(), flags.clone(), records.clone(), gate.clone());
        Harness { remote, backend, flags, records, gate, coordinator }
    }

    fn sign_in(h: &Harness) {
        let identity = PlayerIdentity::new("g:me", Some("Me".to_string()));
        h.remote.set_player(Some(identity.clone()));
        h.gate.establish(identity);
    }

    #[tokio::test]
    async fn test_ack_settles_best() {
        let h = harness();
        sign_in(&h);

        assert!(h.coordinator.record(Category::GlobalScore, 1500, true));
        assert!(!h.flags.get(Category::GlobalScore));

        let outcome = h.coordinator.submit(Category::GlobalScore, 1500, true).await;
        assert!(matches!(outcome, SubmissionOutcome::Settled(ref ack) if ack.value == 1500));
        assert!(h.flags.get(Category::GlobalScore));
        assert_eq!(h.backend.get("submitted:36").unwrap(), Some(serde_json::json!(true)));
    }

    #[tokio::test]
    async fn test_failure_stays_pending() {
        let h = harness();
        sign_in(&h);
        h.remote.set_fail_submissions(true);

        h.coordinator.record(Category::LevelTime(4), 42_000, true);
        let outcome = h.coordinator.submit(Category::LevelTime(4), 42_000, true).await;

        assert!(matches!(outcome, SubmissionOutcome::Failed(RemoteError::Unavailable(_))));
        assert!(!h.flags.get(Category::LevelTime(4)));
        assert!(!h.coordinator.is_in_flight(Category::LevelTime(4)));
    }

    #[tokio::test]
    async fn test_no_session_skips_remote_call() {
        let h = harness();

        h.coordinator.record(Category::GlobalScore, 1500, true);
        let outcome = h.coordinator.submit(Category::GlobalScore, 1500, true).await;

        assert_eq!(outcome, SubmissionOutcome::Skipped(SkipReason::NoSession));
        assert_eq!(h.remote.submit_calls(Category::GlobalScore), 0);
        assert!(!h.flags.get(Category::GlobalScore));
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_noops() {
        let h = harness();
        sign_in(&h);

        assert!(!h.coordinator.record(Category::GlobalScore, 0, true));
        assert!(!h.coordinator.record(Category::LevelTime(36), 100, true));
        assert!(h.flags.pending().is_empty());

        let outcome = h.coordinator.submit(Category::GlobalScore, -5, true).await;
        assert_eq!(outcome, SubmissionOutcome::Skipped(SkipReason::InvalidArgument));
        let outcome = h.coordinator.submit(Category::LevelTime(40), 5, true).await;
        assert_eq!(outcome, SubmissionOutcome::Skipped(SkipReason::InvalidArgument));
        assert_eq!(h.remote.submit_calls(Category::GlobalScore), 0);
    }

    #[tokio::test]
    async fn test_non_best_does_not_touch_flag() {
        let h = harness();
        sign_in(&h);

        h.coordinator.record(Category::GlobalScore, 300, false);
        assert!(h.flags.get(Category::GlobalScore));

        let outcome = h.coordinator.submit(Category::GlobalScore, 300, false).await;
        assert!(matches!(outcome, SubmissionOutcome::Acknowledged(_)));
        assert!(h.flags.get(Category::GlobalScore));
        assert_eq!(h.records.best(Category::GlobalScore), None);
    }

    #[tokio::test]
    async fn test_older_ack_does_not_settle_newer_best() {
        let h = harness();
        sign_in(&h);

        h.coordinator.record(Category::GlobalScore, 1500, true);
        h.coordinator.record(Category::GlobalScore, 1800, true);
        let outcome = h.coordinator.submit(Category::GlobalScore, 1500, true).await;

        assert!(matches!(outcome, SubmissionOutcome::Acknowledged(_)));
        assert!(!h.flags.get(Category::GlobalScore));
    }

    #[test]
    fn test_settle_never_lands_on_newer_best() {
        let h = harness();
        let category = Category::GlobalScore;

        for round in 1..=200i64 {
            let acked = round * 10;
            let newer = acked + 5;
            h.coordinator.record(category, acked, true);

            let barrier = std::sync::Barrier::new(2);
            std::thread::scope(|s| {
                let settle = s.spawn(|| {
                    barrier.wait();
                    h.coordinator.settle_if_current(category, acked)
                });
                barrier.wait();
                h.coordinator.record(category, newer, true);
                settle.join().unwrap();
            });

            // Either order leaves the newer best owed.
            assert_eq!(h.records.best(category), Some(newer));
            assert!(!h.flags.get(category), "round {}: newer best marked settled", round);
        }
    }

    #[tokio::test]
    async fn test_retry_after_session_restored_submits_once() {
        let h = harness();

        h.coordinator.record(Category::GlobalScore, 1500, true);
        h.coordinator.record(Category::LevelTime(2), 61_000, true);
        assert!(h.coordinator.retry_pending().await.is_empty());

        sign_in(&h);
        let results = h.coordinator.retry_pending().await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, o)| matches!(o, SubmissionOutcome::Settled(_))));
        assert_eq!(h.remote.submit_calls(Category::GlobalScore), 1);
        assert_eq!(h.remote.submit_calls(Category::LevelTime(2)), 1);

        // Settled categories are not submitted again.
        assert!(h.coordinator.retry_pending().await.is_empty());
        assert_eq!(h.remote.submit_calls(Category::GlobalScore), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failure_submits_again() {
        let h = harness();
        sign_in(&h);
        h.remote.set_fail_submissions(true);

        h.coordinator.record(Category::LevelTime(0), 30_000, true);
        h.coordinator.submit(Category::LevelTime(0), 30_000, true).await;
        assert_eq!(h.remote.submit_calls(Category::LevelTime(0)), 1);

        h.remote.set_fail_submissions(false);
        let results = h.coordinator.retry_pending().await;
        assert_eq!(results.len(), 1);
        assert_eq!(h.remote.submit_calls(Category::LevelTime(0)), 2);
        assert!(h.flags.get(Category::LevelTime(0)));
    }

    #[tokio::test]
    async fn test_pending_without_best_is_settled() {
        let h = harness();
        sign_in(&h);
        h.flags.set(Category::LevelTime(9), false);

        assert!(h.coordinator.retry_pending().await.is_empty());
        assert!(h.flags.get(Category::LevelTime(9)));
        assert_eq!(h.remote.submit_calls(Category::LevelTime(9)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_skips_in_flight_category() {
        let h = Arc::new(harness());
        sign_in(&h);
        h.remote.set_latency(std::time::Duration::from_secs(1));
        h.coordinator.record(Category::GlobalScore, 1500, true);

        let first = {
            let h = h.clone();
            tokio::spawn(async move { h.coordinator.submit(Category::GlobalScore, 1500, true).await })
        };
        tokio::task::yield_now().await;
        assert!(h.coordinator.is_in_flight(Category::GlobalScore));

        assert!(h.coordinator.retry_pending().await.is_empty());
        assert!(matches!(first.await.unwrap(), SubmissionOutcome::Settled(_)));
        assert_eq!(h.remote.submit_calls(Category::GlobalScore), 1);
        assert!(!h.coordinator.is_in_flight(Category::GlobalScore));
    }
}
