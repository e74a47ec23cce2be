//! Local Records
//!
//! The player's own bests, kept so that a pending submission can be
//! replayed after a restart, and the cached display name.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

use crate::core::category::{Category, CATEGORY_COUNT};
use crate::storage::kv::KeyValueStore;

/// Durable key of the cached display name.
pub const DISPLAY_NAME_KEY: &str = "display_name";

struct RecordsInner {
    bests: [Option<i64>; CATEGORY_COUNT],
    display_name: String,
}

/// Local bests and display name, persisted on every change.
pub struct LocalRecords {
    inner: Mutex<RecordsInner>,
    default_display_name: String,
    backend: Arc<dyn KeyValueStore>,
}

impl LocalRecords {
    /// Load records from `backend`.
    pub fn load(backend: Arc<dyn KeyValueStore>, default_display_name: &str) -> Self {
        let mut bests = [None; CATEGORY_COUNT];
        for category in Category::all() {
            let key = category.best_key();
            match backend.get(&key) {
                Ok(Some(value)) => bests[category.index()] = value.as_i64(),
                Ok(None) => {}
                Err(e) => warn!("Failed to read {}: {}", key, e),
            }
        }

        let display_name = match backend.get(DISPLAY_NAME_KEY) {
            Ok(Some(Value::String(name))) if !name.is_empty() => name,
            Ok(_) => default_display_name.to_string(),
            Err(e) => {
                warn!("Failed to read display name: {}", e);
                default_display_name.to_string()
            }
        };

        Self {
            inner: Mutex::new(RecordsInner { bests, display_name }),
            default_display_name: default_display_name.to_string(),
            backend,
        }
    }

    /// Local best for `category`.
    pub fn best(&self, category: Category) -> Option<i64> {
        if !category.is_valid() {
            return None;
        }
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.bests[category.index()]
    }

    /// Record a new best for `category` and persist it.
    pub fn set_best(&self, category: Category, value: i64) {
        if !category.is_valid() {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.bests[category.index()] = Some(value);

        if let Err(e) = self.backend.put(&category.best_key(), Value::from(value)) {
            warn!("Failed to persist best for {}: {}", category, e);
        }
    }

    /// Cached display name.
    pub fn display_name(&self) -> String {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).display_name.clone()
    }

    /// Check if the display name is still the placeholder.
    pub fn has_default_display_name(&self) -> bool {
        self.display_name() == self.default_display_name
    }

    /// Cache a display name. Empty names are ignored.
    pub fn set_display_name(&self, name: &str) {
        if name.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.display_name == name {
            return;
        }
        inner.display_name = name.to_string();

        if let Err(e) = self.backend.put(DISPLAY_NAME_KEY, Value::from(name)) {
            warn!("Failed to persist display name: {}", e);
        }
    }
}

impl std::fmt::Debug for LocalRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRecords")
            .field("display_name", &self.display_name())
            .finish()
    }
}
