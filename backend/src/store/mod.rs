//! Batch Store - In-memory state of every batch seen by this process
//!
//! One lock guards the whole map, so a reader never sees a batch whose
//! counters and outcomes disagree. Entries are never evicted.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::BatchError;
use crate::models::{BatchState, BatchStatus, StatusSnapshot};

/// Process-wide map from batch id to batch state.
#[derive(Debug, Default)]
pub struct BatchStore {
    batches: RwLock<HashMap<String, BatchState>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch. An id already present is refused and the stored
    /// batch is left untouched.
    pub fn insert(&self, state: BatchState) -> Result<(), BatchError> {
        let mut batches = self.batches.write();
        if batches.contains_key(&state.batch_id) {
            return Err(BatchError::AlreadyExists(state.batch_id));
        }
        batches.insert(state.batch_id.clone(), state);
        Ok(())
    }

    /// Apply `f` to a batch under the write lock.
    pub fn update<F>(&self, batch_id: &str, f: F) -> Result<(), BatchError>
    where
        F: FnOnce(&mut BatchState),
    {
        let mut batches = self.batches.write();
        let state = batches
            .get_mut(batch_id)
            .ok_or_else(|| BatchError::NotFound(batch_id.to_string()))?;
        f(state);
        Ok(())
    }

    /// Snapshot of a batch, with progress.
    pub fn get_status(&self, batch_id: &str) -> Result<StatusSnapshot, BatchError> {
        self.batches
            .read()
            .get(batch_id)
            .cloned()
            .map(StatusSnapshot::from)
            .ok_or_else(|| BatchError::NotFound(batch_id.to_string()))
    }

    /// Number of batches still processing
    pub fn active_count(&self) -> usize {
        self.batches
            .read()
            .values()
            .filter(|b| b.status == BatchStatus::Processing)
            .count()
    }

    pub fn contains(&self, batch_id: &str) -> bool {
        self.batches.read().contains_key(batch_id)
    }

    pub fn len(&self) -> usize {
        self.batches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityRecord, RowOutcome};

    #[test]
    fn test_unknown_batch_not_found() {
        let store = BatchStore::new();
        assert_eq!(
            store.get_status("missing").unwrap_err(),
            BatchError::NotFound("missing".into())
        );
        assert!(store.update("missing", |_| {}).is_err());
    }

    #[test]
    fn test_mid_processing_snapshot() {
        let store = BatchStore::new();
        store.insert(BatchState::new("b1", 4)).unwrap();

        let record = EntityRecord {
            name: "A".into(),
            address: "X".into(),
            phone: None,
            source_row: 1,
        };
        store
            .update("b1", |state| {
                state.outcomes.push(RowOutcome::created(&record, 1));
                state.processed_count = 1;
            })
            .unwrap();

        let snapshot = store.get_status("b1").unwrap();
        assert_eq!(snapshot.state.status, BatchStatus::Processing);
        assert!(snapshot.progress > 0.0 && snapshot.progress < 1.0);
        assert_eq!(snapshot.progress, 0.25);
        assert_eq!(snapshot.state.outcomes.len(), 1);
    }

    #[test]
    fn test_insert_refuses_existing_id() {
        let store = BatchStore::new();
        store.insert(BatchState::new("b1", 2)).unwrap();
        store
            .update("b1", |state| state.status = BatchStatus::Completed)
            .unwrap();

        assert_eq!(
            store.insert(BatchState::new("b1", 5)).unwrap_err(),
            BatchError::AlreadyExists("b1".into())
        );
        let kept = store.get_status("b1").unwrap().state;
        assert_eq!(kept.total, 2);
        assert_eq!(kept.status, BatchStatus::Completed);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_active_count() {
        let store = BatchStore::new();
        store.insert(BatchState::new("a", 1)).unwrap();
        store.insert(BatchState::new("b", 1)).unwrap();
        store
            .update("b", |state| state.status = BatchStatus::Completed)
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.active_count(), 1);
        assert!(store.contains("a"));
    }
}
