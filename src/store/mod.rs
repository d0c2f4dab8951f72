//! # Serialized Store
//!
//! In-memory key-value store whose reads and writes are mutually exclusive.
//!
//! Every access path (direct method calls, the [`StoreActor`] message
//! handlers, snapshots) goes through one `parking_lot::Mutex`, so calls from
//! any thread are totally ordered by arrival. Saves are last-writer-wins and
//! each save is stamped with a store-wide, strictly increasing revision taken
//! inside the same critical section, which makes that order observable.
//!
//! ```rust
//! use tasker_concurrency::store::SerializedStore;
//!
//! let store = SerializedStore::new();
//! store.save("1", "Alice".to_string());
//!
//! assert_eq!(store.get("1").map(|e| e.payload), Some("Alice".to_string()));
//! assert!(store.get("2").is_none());
//! ```

pub mod actor;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::StoreConfig;
use crate::log_store;

pub use actor::{GetEntryMessage, SaveEntryMessage, StoreActor};

/// A stored payload and the revision at which it was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry<P> {
    pub id: String,
    pub payload: P,
    pub revision: u64,
}

#[derive(Debug)]
struct StoreState<P> {
    entries: HashMap<String, Entry<P>>,
    last_revision: u64,
}

/// Mutually-exclusive identifier → entry mapping
#[derive(Debug)]
pub struct SerializedStore<P> {
    state: Mutex<StoreState<P>>,
}

impl<P: Clone> SerializedStore<P> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(StoreState {
                entries: HashMap::with_capacity(capacity),
                last_revision: 0,
            }),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::with_capacity(config.initial_capacity)
    }

    /// Look up an entry; `None` means the identifier was never saved
    pub fn get(&self, id: &str) -> Option<Entry<P>> {
        let state = self.state.lock();
        let entry = state.entries.get(id).cloned();
        log_store!(trace, "GET", id: id, found: entry.is_some());
        entry
    }

    /// Save a payload under `id`, replacing any previous entry
    ///
    /// Returns the revision assigned to this write.
    pub fn save(&self, id: impl Into<String>, payload: P) -> u64 {
        let id = id.into();
        let mut state = self.state.lock();
        state.last_revision += 1;
        let revision = state.last_revision;
        log_store!(trace, "SAVE", id: &id, revision: revision);
        state.entries.insert(
            id.clone(),
            Entry {
                id,
                payload,
                revision,
            },
        );
        revision
    }

    /// Save an existing entry's id and payload; its revision is reassigned
    pub fn save_entry(&self, entry: Entry<P>) -> u64 {
        self.save(entry.id, entry.payload)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest revision handed out so far (0 before the first save)
    pub fn last_revision(&self) -> u64 {
        self.state.lock().last_revision
    }

    /// Consistent copy of every entry, ordered by revision
    pub fn snapshot(&self) -> Vec<Entry<P>> {
        let mut entries: Vec<_> = self.state.lock().entries.values().cloned().collect();
        entries.sort_by_key(|entry| entry.revision);
        entries
    }
}

impl<P: Clone> Default for SerializedStore<P> {
    fn default() -> Self {
        Self::new()
    }
}
