//! # Chewman Leaderboard Sync
//!
//! Keeps the player's local bests and the remote ranking service in step.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   LEADERBOARD SYNC ENGINE                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure data                                 │
//! │  ├── category.rs - Category, Window, Slot addressing         │
//! │  ├── entry.rs    - ScoreEntry, RankingSlice                  │
//! │  └── identity.rs - Signed-in player                          │
//! │                                                              │
//! │  storage/        - Durable state                             │
//! │  ├── kv.rs       - Key/value contract, JSON file store       │
//! │  ├── submission.rs - Per-category submitted flags            │
//! │  └── records.rs  - Local bests, display name                 │
//! │                                                              │
//! │  remote/         - Ranking service contract                  │
//! │  └── memory.rs   - In-process implementation                 │
//! │                                                              │
//! │  sync/           - The engine                                │
//! │  ├── cache.rs    - Per-slot rows and readiness               │
//! │  ├── scheduler.rs- Paced read dispatch                       │
//! │  ├── aggregator.rs - Outcome consumer                        │
//! │  ├── submission.rs - Pending/Settled state machine           │
//! │  └── session.rs  - Façade                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - A best is never re-submitted once the service acknowledged it.
//! - A best whose submission failed, or never started, stays owed across
//!   restarts until an ack arrives.
//! - Reads never fail: anything not yet known reads as an empty entry.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod remote;
pub mod storage;
pub mod sync;

// Re-export commonly used types
pub use crate::config::{ConfigError, SyncConfig};
pub use crate::core::category::{Category, Slot, Window, CATEGORY_COUNT, LEVEL_COUNT};
pub use crate::core::entry::{RankingSlice, ScoreEntry};
pub use crate::core::identity::{PlayerId, PlayerIdentity};
pub use remote::{Collection, InMemoryLeaderboard, RemoteError, RemoteLeaderboard, SubmitAck};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
pub use sync::{SubmissionOutcome, SyncSession};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
