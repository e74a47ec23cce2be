//! In-Memory Leaderboard
//!
//! A complete `RemoteLeaderboard` held in process memory. Used by the demo
//! binary and by tests, with switches to make calls fail or never return
//! and a log of every call for assertions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::core::category::{Category, QueryKind, Window};
use crate::core::entry::ScoreEntry;
use crate::core::identity::{PlayerId, PlayerIdentity};
use crate::remote::{Collection, RemoteError, RemoteLeaderboard, SubmitAck};

/// One recorded read call.
#[derive(Clone, Debug)]
pub struct QueryRecord {
    /// Category queried.
    pub category: Category,
    /// Window queried.
    pub window: Window,
    /// Top list or self entry.
    pub kind: QueryKind,
    /// Cache bypass flag as received.
    pub force_refresh: bool,
    /// When the call was received (tokio clock).
    pub at: Instant,
}

#[derive(Clone, Debug)]
struct Submission {
    value: i64,
    at: DateTime<Utc>,
}

#[derive(Default)]
struct Board {
    /// Display names by player.
    names: BTreeMap<PlayerId, String>,
    /// Submission history per category and player.
    history: BTreeMap<Category, BTreeMap<PlayerId, Vec<Submission>>>,
    /// Signed-in player.
    current: Option<PlayerIdentity>,
}

/// Ranking service held in memory.
#[derive(Default)]
pub struct InMemoryLeaderboard {
    board: Mutex<Board>,
    latency: Mutex<Duration>,
    fail_queries: AtomicBool,
    fail_submissions: AtomicBool,
    stall_queries: AtomicBool,
    failing_categories: Mutex<BTreeSet<Category>>,
    submit_calls: Mutex<BTreeMap<Category, usize>>,
    query_log: Mutex<Vec<QueryRecord>>,
}

impl InMemoryLeaderboard {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign a player in (or out with `None`).
    pub fn set_player(&self, identity: Option<PlayerIdentity>) {
        let mut board = lock(&self.board);
        if let Some(ref identity) = identity {
            let name = identity
                .display_name
                .clone()
                .unwrap_or_else(|| format!("Player-{}", identity.player_id.short_hex()));
            board.names.insert(identity.player_id, name);
        }
        board.current = identity;
    }

    /// Record a score for any player at a given time, bypassing call accounting.
    pub fn insert_score(
        &self,
        identity: &PlayerIdentity,
        category: Category,
        value: i64,
        at: DateTime<Utc>,
    ) {
        let mut board = lock(&self.board);
        let name = identity.display_name.clone().unwrap_or_default();
        board.names.entry(identity.player_id).or_insert(name);
        board
            .history
            .entry(category)
            .or_default()
            .entry(identity.player_id)
            .or_default()
            .push(Submission { value, at });
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Make every read fail.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make every submission fail.
    pub fn set_fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    /// Make every read hang forever.
    pub fn set_stall_queries(&self, stall: bool) {
        self.stall_queries.store(stall, Ordering::SeqCst);
    }

    /// Make reads of one category fail.
    pub fn fail_category(&self, category: Category) {
        lock(&self.failing_categories).insert(category);
    }

    /// Number of submission calls received for `category`.
    pub fn submit_calls(&self, category: Category) -> usize {
        lock(&self.submit_calls).get(&category).copied().unwrap_or(0)
    }

    /// Every read call received so far.
    pub fn query_log(&self) -> Vec<QueryRecord> {
        lock(&self.query_log).clone()
    }

    async fn enter_query(
        &self,
        category: Category,
        window: Window,
        kind: QueryKind,
        force_refresh: bool,
    ) -> Result<(), RemoteError> {
        lock(&self.query_log).push(QueryRecord {
            category,
            window,
            kind,
            force_refresh,
            at: Instant::now(),
        });

        self.simulate_latency().await;

        if self.stall_queries.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_queries.load(Ordering::SeqCst) || lock(&self.failing_categories).contains(&category) {
            return Err(RemoteError::Unavailable(format!("{} {} unreachable", category, window)));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Ranked standings of one series: (player, best value), best first.
    fn standings(
        board: &Board,
        category: Category,
        window: Window,
        collection: Collection,
    ) -> Vec<(PlayerId, i64)> {
        let Some(players) = board.history.get(&category) else {
            return Vec::new();
        };
        let since = match window {
            Window::AllTime => None,
            Window::Weekly => Some(week_start(Utc::now())),
        };
        let current = board.current.as_ref().map(|p| p.player_id);

        let mut rows: Vec<(PlayerId, i64)> = players
            .iter()
            .filter(|(id, _)| collection == Collection::Public || Some(**id) == current)
            .filter_map(|(id, subs)| {
                subs.iter()
                    .filter(|s| since.map_or(true, |start| s.at >= start))
                    .map(|s| s.value)
                    .reduce(|a, b| if category.is_improvement(b, Some(a)) { b } else { a })
                    .map(|best| (*id, best))
            })
            .collect();

        rows.sort_by(|a, b| {
            let by_value = if category.higher_is_better() {
                b.1.cmp(&a.1)
            } else {
                a.1.cmp(&b.1)
            };
            by_value.then(a.0.cmp(&b.0))
        });
        rows
    }

    fn to_entry(board: &Board, player: PlayerId, value: i64, rank: usize) -> ScoreEntry {
        let name = board.names.get(&player).cloned().unwrap_or_default();
        ScoreEntry::new(name, value, Some(rank as u64 + 1))
    }
}

#[async_trait]
impl RemoteLeaderboard for InMemoryLeaderboard {
    async fn submit_score(&self, category: Category, value: i64) -> Result<SubmitAck, RemoteError> {
        *lock(&self.submit_calls).entry(category).or_insert(0) += 1;
        self.simulate_latency().await;

        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("submission endpoint down".to_string()));
        }
        if !category.is_valid() {
            return Err(RemoteError::Rejected(format!("unknown leaderboard {}", category.leaderboard_id())));
        }

        let mut board = lock(&self.board);
        let player = board.current.as_ref().map(|p| p.player_id).ok_or(RemoteError::NoSession)?;
        board
            .history
            .entry(category)
            .or_default()
            .entry(player)
            .or_default()
            .push(Submission { value, at: Utc::now() });

        debug!("Recorded {} for player {} in {}", value, player.short_hex(), category);

        Ok(SubmitAck {
            category,
            value,
            receipt: Uuid::new_v4(),
        })
    }

    async fn load_top_entries(
        &self,
        category: Category,
        window: Window,
        collection: Collection,
        limit: usize,
        force_refresh: bool,
    ) -> Result<Vec<ScoreEntry>, RemoteError> {
        self.enter_query(category, window, QueryKind::Top, force_refresh).await?;

        let board = lock(&self.board);
        Ok(Self::standings(&board, category, window, collection)
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, (player, value))| Self::to_entry(&board, player, value, rank))
            .collect())
    }

    async fn load_self_entry(
        &self,
        category: Category,
        window: Window,
        collection: Collection,
    ) -> Result<ScoreEntry, RemoteError> {
        self.enter_query(category, window, QueryKind::SelfEntry, false).await?;

        let board = lock(&self.board);
        let player = board.current.as_ref().map(|p| p.player_id).ok_or(RemoteError::NoSession)?;
        Self::standings(&board, category, window, collection)
            .into_iter()
            .enumerate()
            .find(|(_, (id, _))| *id == player)
            .map(|(rank, (id, value))| Self::to_entry(&board, id, value, rank))
            .ok_or(RemoteError::NotFound)
    }
}

/// Monday 00:00 UTC of the week containing `now`.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days = now.weekday().num_days_from_monday() as i64;
    let date = now.date_naive() - chrono::Duration::days(days);
    date.and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| Utc.from_utc_datetime(&midnight))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
