//! Puzzle Persistence
//!
//! The `puzzles` collection, keyed by output reference. The ledger only needs
//! point lookups, insert-if-absent, two field-level updates and the startup
//! query for unsolved records.

use std::collections::BTreeMap;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use super::record::{OutRef, PuzzleRecord, Solution};

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A record with this reference already exists.
    #[error("duplicate puzzle {0}")]
    Duplicate(OutRef),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Result of a conditional solve write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveWrite {
    /// Solution fields written.
    Applied,
    /// Record was already solved; nothing written.
    AlreadySolved,
    /// No record for the reference.
    Missing,
}

/// Persistent puzzle collection.
#[async_trait]
pub trait PuzzleStore: Send + Sync {
    /// Point lookup.
    async fn get(&self, reference: &OutRef) -> Result<Option<PuzzleRecord>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the
    /// reference exists.
    async fn insert(&self, record: &PuzzleRecord) -> Result<(), StoreError>;

    /// Set `confirmed = true`. Returns false if the record is missing.
    async fn set_confirmed(&self, reference: &OutRef) -> Result<bool, StoreError>;

    /// Write solution fields only while `solved = false`.
    async fn apply_solution(
        &self,
        reference: &OutRef,
        solution: &Solution,
    ) -> Result<SolveWrite, StoreError>;

    /// References of all unsolved records.
    async fn unsolved(&self) -> Result<Vec<OutRef>, StoreError>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Store kept in process memory.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<OutRef, PuzzleRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PuzzleStore for MemoryStore {
    async fn get(&self, reference: &OutRef) -> Result<Option<PuzzleRecord>, StoreError> {
        Ok(self.records.read().await.get(reference).cloned())
    }

    async fn insert(&self, record: &PuzzleRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.reference) {
            return Err(StoreError::Duplicate(record.reference.clone()));
        }
        records.insert(record.reference.clone(), record.clone());
        Ok(())
    }

    async fn set_confirmed(&self, reference: &OutRef) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(reference) {
            Some(record) => {
                record.confirmed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn apply_solution(
        &self,
        reference: &OutRef,
        solution: &Solution,
    ) -> Result<SolveWrite, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(reference) else {
            return Ok(SolveWrite::Missing);
        };
        if record.apply_solution(solution) {
            Ok(SolveWrite::Applied)
        } else {
            Ok(SolveWrite::AlreadySolved)
        }
    }

    async fn unsolved(&self) -> Result<Vec<OutRef>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| !r.solved)
            .map(|r| r.reference.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::fixtures::{open_record, solution};

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let record = open_record("aa", 0);
        store.insert(&record).await.unwrap();

        assert_eq!(store.get(&record.reference).await.unwrap(), Some(record));
        assert_eq!(store.get(&OutRef::new("aa", 1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_is_distinguishable() {
        let store = MemoryStore::new();
        let record = open_record("aa", 0);
        store.insert(&record).await.unwrap();

        let err = store.insert(&record).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate(record.reference.clone()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_confirmed() {
        let store = MemoryStore::new();
        let record = open_record("aa", 0);
        store.insert(&record).await.unwrap();

        assert!(store.set_confirmed(&record.reference).await.unwrap());
        assert!(store.get(&record.reference).await.unwrap().unwrap().confirmed);
        assert!(!store.set_confirmed(&OutRef::new("bb", 0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_solution_written_once() {
        let store = MemoryStore::new();
        let record = open_record("aa", 0);
        store.insert(&record).await.unwrap();

        let first = store.apply_solution(&record.reference, &solution(100.0)).await.unwrap();
        let second = store.apply_solution(&record.reference, &solution(-1.0)).await.unwrap();
        assert_eq!(first, SolveWrite::Applied);
        assert_eq!(second, SolveWrite::AlreadySolved);

        let stored = store.get(&record.reference).await.unwrap().unwrap();
        assert_eq!(stored.solution.unwrap().score, 100.0);

        let missing = store.apply_solution(&OutRef::new("bb", 0), &solution(1.0)).await.unwrap();
        assert_eq!(missing, SolveWrite::Missing);
    }

    #[tokio::test]
    async fn test_unsolved_query() {
        let store = MemoryStore::new();
        store.insert(&open_record("aa", 0)).await.unwrap();
        store.insert(&open_record("aa", 1)).await.unwrap();
        store.apply_solution(&OutRef::new("aa", 0), &solution(1.0)).await.unwrap();

        assert_eq!(store.unsolved().await.unwrap(), vec![OutRef::new("aa", 1)]);
    }
}
