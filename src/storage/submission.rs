//! Submission State Store
//!
//! One durable "submitted" flag per category. `true` means nothing is owed
//! to the remote; `false` means a local best still waits for an ack.
//!
//! Writes are point writes made before `set` returns. A failed write is
//! logged and the in-memory flag keeps the caller's value, so reads never
//! depend on the backend being healthy.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

use crate::core::category::{Category, CATEGORY_COUNT};
use crate::storage::kv::KeyValueStore;

/// Durable per-category submission flags.
pub struct SubmissionStateStore {
    flags: Mutex<[bool; CATEGORY_COUNT]>,
    backend: Arc<dyn KeyValueStore>,
}

impl SubmissionStateStore {
    /// Load every flag from `backend`. Missing or unreadable keys default to settled.
    pub fn load(backend: Arc<dyn KeyValueStore>) -> Self {
        let mut flags = [true; CATEGORY_COUNT];

        for category in Category::all() {
            let key = category.submitted_key();
            match backend.get(&key) {
                Ok(Some(Value::Bool(flag))) => flags[category.index()] = flag,
                Ok(Some(other)) => warn!("Ignoring non-boolean value for {}: {}", key, other),
                Ok(None) => {}
                Err(e) => warn!("Failed to read {}: {}", key, e),
            }
        }

        Self {
            flags: Mutex::new(flags),
            backend,
        }
    }

    /// Check whether `category` has nothing owed. Invalid categories read as settled.
    pub fn get(&self, category: Category) -> bool {
        if !category.is_valid() {
            return true;
        }
        let flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags[category.index()]
    }

    /// Set the flag and persist it. Invalid categories are ignored.
    pub fn set(&self, category: Category, submitted: bool) {
        if !category.is_valid() {
            return;
        }

        // Held across the write so that concurrent sets reach disk in memory order.
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags[category.index()] = submitted;

        if let Err(e) = self.backend.put(&category.submitted_key(), Value::Bool(submitted)) {
            warn!("Failed to persist submit state for {}: {}", category, e);
        }
    }

    /// Categories whose flag is `false`.
    pub fn pending(&self) -> Vec<Category> {
        let flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        Category::all().filter(|c| !flags[c.index()]).collect()
    }
}

impl std::fmt::Debug for SubmissionStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionStateStore")
            .field("pending", &self.pending())
            .finish()
    }
}
