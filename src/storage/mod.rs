//! Durable Storage
//!
//! Everything that must survive a restart: submission flags, local bests
//! and the cached display name, all behind one key/value contract.

pub mod kv;
pub mod records;
pub mod submission;

pub use kv::{KeyValueStore, JsonFileStore, MemoryStore, StoreError};
pub use records::{LocalRecords, DISPLAY_NAME_KEY};
pub use submission::SubmissionStateStore;
