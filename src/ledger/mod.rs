//! Puzzle Ledger
//!
//! Lifecycle of every puzzle record, backed by a [`PuzzleStore`]:
//!
//! ```text
//!   absent ──open_puzzle──▶ open ──mark_solved──▶ solved
//!                            │ ▲
//!                            └─┘ open_puzzle again (confirmation flip)
//! ```
//!
//! The ledger owns the open-reference index: the set of references whose
//! records are unsolved. It is filled by [`PuzzleLedger::hydrate`] at startup,
//! grows on creation and shrinks on solve, and nothing else touches it. It
//! lets the pipeline check every spent input without a store round-trip.

pub mod record;
pub mod sqlite;
pub mod store;

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use record::{OutRef, PuzzleRecord, Solution};
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, PuzzleStore, SolveWrite, StoreError};

/// Ledger errors. All of them are fatal to the event being processed.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An open reference has no backing record: index and store diverged.
    #[error("no puzzle record for open reference {0}")]
    NotFound(OutRef),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of observing a puzzle creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// New record persisted and indexed.
    Inserted,
    /// Record existed; `confirmed` flipped to true.
    Reconfirmed,
    /// Record existed and nothing changed.
    AlreadyKnown,
}

/// Result of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Solution persisted.
    Solved,
    /// The store already held a solution; first-set fields kept.
    AlreadySolved,
}

/// Open-reference index plus the store it mirrors.
pub struct PuzzleLedger {
    store: Arc<dyn PuzzleStore>,
    open: BTreeSet<OutRef>,
    hydrated: bool,
}

impl PuzzleLedger {
    /// Create a ledger over a store. Call [`hydrate`](Self::hydrate) before use.
    pub fn new(store: Arc<dyn PuzzleStore>) -> Self {
        Self {
            store,
            open: BTreeSet::new(),
            hydrated: false,
        }
    }

    /// Load every unsolved reference into the index.
    pub async fn hydrate(&mut self) -> Result<usize, LedgerError> {
        let refs = self.store.unsolved().await?;
        for reference in refs {
            debug!("open puzzle {}", reference);
            self.open.insert(reference);
        }
        self.hydrated = true;
        info!("Hydrated {} open puzzles", self.open.len());
        Ok(self.open.len())
    }

    /// True once hydration has completed.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Index lookup; never touches the store.
    #[inline]
    pub fn is_open(&self, reference: &OutRef) -> bool {
        self.open.contains(reference)
    }

    /// Number of open puzzles.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn PuzzleStore> {
        &self.store
    }

    /// Record a puzzle creation.
    ///
    /// A duplicate reference is a re-observation of the same output (mempool
    /// then block), so only `confirmed` may change. `created_at` is kept.
    pub async fn open_puzzle(&mut self, record: PuzzleRecord) -> Result<OpenOutcome, LedgerError> {
        match self.store.insert(&record).await {
            Ok(()) => {
                info!(
                    "Opened {} puzzle {} target {} ({} sats, confirmed: {})",
                    record.family, record.reference, record.target, record.value, record.confirmed
                );
                self.open.insert(record.reference);
                Ok(OpenOutcome::Inserted)
            }
            Err(StoreError::Duplicate(reference)) => {
                if !record.confirmed {
                    debug!("Puzzle {} already known", reference);
                    return Ok(OpenOutcome::AlreadyKnown);
                }
                if !self.store.set_confirmed(&reference).await? {
                    return Err(LedgerError::NotFound(reference));
                }
                debug!("Puzzle {} confirmed", reference);
                Ok(OpenOutcome::Reconfirmed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load the record behind an open reference.
    pub async fn find_open(&self, reference: &OutRef) -> Result<PuzzleRecord, LedgerError> {
        self.store
            .get(reference)
            .await?
            .ok_or_else(|| LedgerError::NotFound(reference.clone()))
    }

    /// Persist a solution and drop the reference from the index.
    ///
    /// On any error the reference stays open so the event can be retried.
    pub async fn mark_solved(
        &mut self,
        reference: &OutRef,
        solution: &Solution,
    ) -> Result<SolveOutcome, LedgerError> {
        let outcome = match self.store.apply_solution(reference, solution).await? {
            SolveWrite::Applied => SolveOutcome::Solved,
            SolveWrite::AlreadySolved => {
                warn!("Puzzle {} was already solved, keeping first solution", reference);
                SolveOutcome::AlreadySolved
            }
            SolveWrite::Missing => return Err(LedgerError::NotFound(reference.clone())),
        };
        self.open.remove(reference);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::fixtures::{open_record, solution};

    fn ledger() -> (Arc<MemoryStore>, PuzzleLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = PuzzleLedger::new(store.clone());
        (store, ledger)
    }

    #[tokio::test]
    async fn test_hydrate_loads_unsolved_only() {
        let (store, _) = ledger();
        store.insert(&open_record("aa", 0)).await.unwrap();
        store.insert(&open_record("bb", 0)).await.unwrap();
        store.apply_solution(&OutRef::new("bb", 0), &solution(1.0)).await.unwrap();

        let mut ledger = PuzzleLedger::new(store.clone());
        assert!(!ledger.is_hydrated());
        assert_eq!(ledger.hydrate().await.unwrap(), 1);
        assert!(ledger.is_hydrated());
        assert!(ledger.is_open(&OutRef::new("aa", 0)));
        assert!(!ledger.is_open(&OutRef::new("bb", 0)));
    }

    #[tokio::test]
    async fn test_open_puzzle_indexes() {
        let (_, mut ledger) = ledger();
        let record = open_record("aa", 1);
        let reference = record.reference.clone();

        assert!(!ledger.is_open(&reference));
        assert_eq!(ledger.open_puzzle(record).await.unwrap(), OpenOutcome::Inserted);
        assert!(ledger.is_open(&reference));
        assert_eq!(ledger.open_count(), 1);
    }

    #[tokio::test]
    async fn test_reconfirmation_is_idempotent() {
        let (store, mut ledger) = ledger();
        let record = open_record("aa", 0);
        let reference = record.reference.clone();

        ledger.open_puzzle(record.clone()).await.unwrap();

        let mut confirmed = record.clone();
        confirmed.confirmed = true;
        confirmed.created_at += 600;
        assert_eq!(ledger.open_puzzle(confirmed).await.unwrap(), OpenOutcome::Reconfirmed);

        assert_eq!(store.len().await, 1);
        let stored = store.get(&reference).await.unwrap().unwrap();
        assert!(stored.confirmed);
        assert_eq!(stored.created_at, record.created_at);
        assert_eq!(ledger.open_count(), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_reobservation_changes_nothing() {
        let (store, mut ledger) = ledger();
        let record = open_record("aa", 0);
        ledger.open_puzzle(record.clone()).await.unwrap();
        assert_eq!(ledger.open_puzzle(record).await.unwrap(), OpenOutcome::AlreadyKnown);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_mark_solved_removes_from_index() {
        let (store, mut ledger) = ledger();
        let record = open_record("aa", 0);
        let reference = record.reference.clone();
        ledger.open_puzzle(record).await.unwrap();

        let outcome = ledger.mark_solved(&reference, &solution(1e4)).await.unwrap();
        assert_eq!(outcome, SolveOutcome::Solved);
        assert!(!ledger.is_open(&reference));

        let stored = store.get(&reference).await.unwrap().unwrap();
        assert!(stored.solved);
        assert_eq!(stored.solution, Some(solution(1e4)));
    }

    #[tokio::test]
    async fn test_second_solve_keeps_first_fields() {
        let (store, mut ledger) = ledger();
        let record = open_record("aa", 0);
        let reference = record.reference.clone();
        ledger.open_puzzle(record).await.unwrap();
        ledger.mark_solved(&reference, &solution(1e4)).await.unwrap();

        let mut late = solution(-3.0);
        late.solved_at += 1;
        late.solution_value = "ff".into();
        let outcome = ledger.mark_solved(&reference, &late).await.unwrap();
        assert_eq!(outcome, SolveOutcome::AlreadySolved);

        let stored = store.get(&reference).await.unwrap().unwrap().solution.unwrap();
        assert_eq!(stored, solution(1e4));
    }

    #[tokio::test]
    async fn test_missing_record_is_fatal_and_keeps_index() {
        let (_, mut ledger) = ledger();
        // Index claims a reference the store does not have
        ledger.open.insert(OutRef::new("aa", 0));

        let reference = OutRef::new("aa", 0);
        assert!(matches!(
            ledger.find_open(&reference).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            ledger.mark_solved(&reference, &solution(1.0)).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(ledger.is_open(&reference));
    }

    #[tokio::test]
    async fn test_solved_record_not_reopened_on_confirmation() {
        let (_, mut ledger) = ledger();
        let record = open_record("aa", 0);
        let reference = record.reference.clone();
        ledger.open_puzzle(record.clone()).await.unwrap();
        ledger.mark_solved(&reference, &solution(1.0)).await.unwrap();

        let mut confirmed = record;
        confirmed.confirmed = true;
        assert_eq!(ledger.open_puzzle(confirmed).await.unwrap(), OpenOutcome::Reconfirmed);
        assert!(!ledger.is_open(&reference));
    }
}
