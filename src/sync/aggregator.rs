//! Result Aggregation
//!
//! Every dispatched query reports back through one channel; a single
//! consumer task applies the outcomes to the cache. Slots are independent,
//! so the terminal cache state does not depend on arrival order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::config::SyncConfig;
use crate::core::category::{Category, QueryKind, Slot};
use crate::core::entry::ScoreEntry;
use crate::remote::RemoteError;
use crate::sync::cache::{Rejected, ScoreCache};

/// Result of one remote read.
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// Top-N list query.
    Top(Result<Vec<ScoreEntry>, RemoteError>),
    /// Self entry query.
    SelfEntry(Result<ScoreEntry, RemoteError>),
}

impl QueryResult {
    /// Which query produced this result.
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryResult::Top(_) => QueryKind::Top,
            QueryResult::SelfEntry(_) => QueryKind::SelfEntry,
        }
    }
}

/// A completed query, tagged with the cycle that issued it.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Refresh cycle the query belongs to.
    pub generation: u64,
    /// Slot the query addressed.
    pub slot: Slot,
    /// What came back.
    pub result: QueryResult,
}

/// What `apply` did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Rows written and slot marked ready.
    Stored,
    /// Query failed; slot marked ready with its old contents.
    Failed,
    /// Outcome belonged to a superseded cycle and was dropped.
    Stale,
    /// Slot does not exist.
    Invalid,
}

/// Applies query outcomes to the cache.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    cache: Arc<ScoreCache>,
    global_top_limit: usize,
    level_top_limit: usize,
    discard_stale: bool,
}

impl ResultAggregator {
    /// Create an aggregator writing into `cache`.
    pub fn new(cache: Arc<ScoreCache>, config: &SyncConfig) -> Self {
        Self {
            cache,
            global_top_limit: config.global_top_limit,
            level_top_limit: config.level_top_limit,
            discard_stale: config.discard_stale_responses,
        }
    }

    /// Spawn the consumer loop. Returns the sender queries report through.
    pub fn spawn(self) -> (mpsc::UnboundedSender<QueryOutcome>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }

    /// Consume outcomes until every sender is dropped.
    #[instrument(skip_all)]
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<QueryOutcome>) {
        while let Some(outcome) = rx.recv().await {
            self.apply(outcome);
        }
        info!("Result aggregator stopped");
    }

    fn top_limit(&self, category: Category) -> usize {
        match category {
            Category::GlobalScore => self.global_top_limit,
            Category::LevelTime(_) => self.level_top_limit,
        }
    }

    /// Apply one outcome to the cache.
    ///
    /// The generation check, the write and the readiness mark happen under
    /// the slot lock, so a cycle switch cannot slip in between them.
    pub fn apply(&self, outcome: QueryOutcome) -> Applied {
        let QueryOutcome { generation, slot, result } = outcome;
        let kind = result.kind();
        let limit = self.top_limit(slot.category);
        let is_level = matches!(slot.category, Category::LevelTime(_));
        let guard = self.discard_stale.then_some(generation);

        let completed = self.cache.complete(slot, kind, guard, |cell| match result {
            QueryResult::Top(Ok(entries)) => {
                // Any level data is news for the UI, changed or not.
                if cell.store_top(entries, limit) && is_level {
                    self.cache.raise_change_flag();
                }
                Ok(())
            }
            QueryResult::Top(Err(e)) => Err(e),
            QueryResult::SelfEntry(Ok(entry)) => {
                cell.store_own(entry);
                Ok(())
            }
            QueryResult::SelfEntry(Err(e)) => {
                cell.mark_own_unknown();
                Err(e)
            }
        });

        match completed {
            Ok(Ok(())) => {
                debug!("Stored {:?} result for {}", kind, slot);
                Applied::Stored
            }
            Ok(Err(e)) => {
                debug!("{:?} query for {} failed: {}", kind, slot, e);
                Applied::Failed
            }
            Err(Rejected::Stale) => {
                debug!("Dropping stale {:?} outcome for {} (generation {})", kind, slot, generation);
                Applied::Stale
            }
            Err(Rejected::Invalid) => {
                debug!("Dropping outcome for invalid slot {:?}", slot);
                Applied::Invalid
            }
        }
    }
}
