//! Remote Leaderboard Service
//!
//! The query/submit contract the engine drives. Every call is async and
//! may complete on whatever executor thread the implementation chooses.
//! The concrete transport lives behind this trait.

pub mod memory;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::category::{Category, Window};
use crate::core::entry::ScoreEntry;

pub use memory::{InMemoryLeaderboard, QueryRecord};

/// Player population a ranking is computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    /// Every player.
    Public,
    /// Players connected to the signed-in player.
    Social,
}

/// Confirmation that a score reached the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// Category the score was recorded in.
    pub category: Category,
    /// Value the service recorded.
    pub value: i64,
    /// Service-side receipt.
    pub receipt: Uuid,
}

/// Remote call failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network or service failure.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The player has no entry in this series.
    #[error("no entry found")]
    NotFound,

    /// Nobody is signed in.
    #[error("no active session")]
    NoSession,
}

/// Remote ranking service.
#[async_trait]
pub trait RemoteLeaderboard: Send + Sync {
    /// Submit a score for the signed-in player. The service records it in
    /// every window.
    async fn submit_score(&self, category: Category, value: i64) -> Result<SubmitAck, RemoteError>;

    /// Load the best `limit` entries of a series. `force_refresh` bypasses
    /// any response cache on the service side.
    async fn load_top_entries(
        &self,
        category: Category,
        window: Window,
        collection: Collection,
        limit: usize,
        force_refresh: bool,
    ) -> Result<Vec<ScoreEntry>, RemoteError>;

    /// Load the signed-in player's own entry, with rank.
    async fn load_self_entry(
        &self,
        category: Category,
        window: Window,
        collection: Collection,
    ) -> Result<ScoreEntry, RemoteError>;
}
