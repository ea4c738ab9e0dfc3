//! In-memory store of finished GIF artifacts keyed by task id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Thread-safe map of task id to GIF bytes. Clones share the same store.
#[derive(Clone, Debug, Default)]
pub struct TaskStore {
    artifacts: Arc<RwLock<HashMap<TaskId, Arc<Vec<u8>>>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: TaskId, gif: Vec<u8>) {
        let mut artifacts = self.artifacts.write().unwrap_or_else(|e| e.into_inner());
        artifacts.insert(id, Arc::new(gif));
        debug!(task = %id, stored = artifacts.len(), "Artifact stored");
    }

    pub fn get(&self, id: &TaskId) -> Option<Arc<Vec<u8>>> {
        let artifacts = self.artifacts.read().unwrap_or_else(|e| e.into_inner());
        artifacts.get(id).cloned()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove one artifact. Returns whether anything was removed.
    pub fn clear(&self, id: &TaskId) -> bool {
        let mut artifacts = self.artifacts.write().unwrap_or_else(|e| e.into_inner());
        artifacts.remove(id).is_some()
    }

    /// Remove every artifact and return how many there were.
    pub fn clear_all(&self) -> usize {
        let mut artifacts = self.artifacts.write().unwrap_or_else(|e| e.into_inner());
        let count = artifacts.len();
        artifacts.clear();
        count
    }
}
