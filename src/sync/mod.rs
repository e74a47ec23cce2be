//! Sync Engine
//!
//! Reconciles local bests with the remote ranking service.
//!
//! - `cache`: per-slot rows and readiness
//! - `aggregator`: single consumer applying query outcomes
//! - `scheduler`: paced dispatch of the read batch
//! - `submission`: Pending/Settled state machine per category
//! - `session`: the engine façade

pub mod aggregator;
pub mod cache;
pub mod gate;
pub mod scheduler;
pub mod session;
pub mod submission;

pub use aggregator::{Applied, QueryOutcome, QueryResult, ResultAggregator};
pub use cache::{Rejected, ScoreCache, SlotCell};
pub use gate::SessionGate;
pub use scheduler::QueryScheduler;
pub use session::SyncSession;
pub use submission::{SkipReason, SubmissionCoordinator, SubmissionOutcome};
