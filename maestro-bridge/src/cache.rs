//! Change detection for published stove state.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::frame::{StateSnapshot, StateValue};

/// Last published value per state key.
#[derive(Debug, Default)]
pub struct StateDiffCache {
    published: Mutex<HashMap<String, StateValue>>,
}

impl StateDiffCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entries of `snapshot` that are new or changed, in snapshot
    /// order, and remember every value of `snapshot`.
    pub fn diff(&self, snapshot: &StateSnapshot) -> StateSnapshot {
        let mut published = self.published.lock();
        let mut changed = StateSnapshot::new();

        for (key, value) in snapshot {
            if published.get(key) != Some(value) {
                published.insert(key.clone(), *value);
                changed.insert(key.clone(), *value);
            }
        }

        changed
    }

    /// Forget everything, so the next snapshot is published in full.
    pub fn clear(&self) {
        self.published.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.published.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.lock().is_empty()
    }
}
