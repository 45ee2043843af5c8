//! SQLite Puzzle Store
//!
//! Durable [`PuzzleStore`] backed by a single `puzzles` table. The reference
//! `(txid, vout)` is the primary key, so a re-inserted puzzle surfaces as a
//! constraint violation and maps to [`StoreError::Duplicate`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;
use rusqlite::ffi::ErrorCode;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::record::{OutRef, PuzzleRecord, Solution};
use super::store::{PuzzleStore, SolveWrite, StoreError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS puzzles (
    txid TEXT NOT NULL,
    vout INTEGER NOT NULL,
    family TEXT NOT NULL,
    payer_address TEXT,
    value INTEGER NOT NULL,
    value_usd REAL,
    confirmed INTEGER NOT NULL,
    hash_commitment TEXT NOT NULL,
    target TEXT NOT NULL,
    content_type TEXT,
    content_reference TEXT,
    symbol TEXT,
    created_at INTEGER NOT NULL,
    solved INTEGER NOT NULL DEFAULT 0,
    solved_at INTEGER,
    solved_by_address TEXT,
    solved_transaction_id TEXT,
    solution_value TEXT,
    score REAL,
    solved_value_usd REAL,
    PRIMARY KEY (txid, vout)
);
CREATE INDEX IF NOT EXISTS idx_puzzles_solved ON puzzles(solved);";

const SELECT_COLUMNS: &str = "txid, vout, family, payer_address, value, value_usd, confirmed,
    hash_commitment, target, content_type, content_reference, symbol, created_at, solved,
    solved_at, solved_by_address, solved_transaction_id, solution_value, score, solved_value_usd";

/// Puzzle store backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("connection mutex poisoned".into()))
    }
}

fn parse_column<T: std::str::FromStr<Err = String>>(
    index: usize,
    value: String,
) -> rusqlite::Result<T> {
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<PuzzleRecord> {
    let solved: bool = row.get(13)?;
    let solution = if solved {
        Some(Solution {
            solved_at: row.get(14)?,
            solved_by_address: row.get(15)?,
            solved_transaction_id: row.get(16)?,
            solution_value: row.get(17)?,
            score: row.get(18)?,
            solved_value_usd: row.get(19)?,
        })
    } else {
        None
    };

    let content_type = match row.get::<_, Option<String>>(9)? {
        Some(s) => Some(parse_column(9, s)?),
        None => None,
    };

    Ok(PuzzleRecord {
        reference: OutRef::new(row.get::<_, String>(0)?, row.get(1)?),
        family: parse_column(2, row.get(2)?)?,
        payer_address: row.get(3)?,
        value: row.get::<_, i64>(4)? as u64,
        value_usd: row.get(5)?,
        confirmed: row.get(6)?,
        hash_commitment: row.get(7)?,
        target: row.get(8)?,
        content_type,
        content_reference: row.get(10)?,
        symbol: row.get(11)?,
        created_at: row.get(12)?,
        solved,
        solution,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl PuzzleStore for SqliteStore {
    async fn get(&self, reference: &OutRef) -> Result<Option<PuzzleRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM puzzles WHERE txid = ?1 AND vout = ?2");
        let record = conn
            .query_row(&sql, params![reference.txid, reference.vout], row_to_record)
            .optional()?;
        Ok(record)
    }

    async fn insert(&self, record: &PuzzleRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let solution = record.solution.as_ref();
        let result = conn.execute(
            "INSERT INTO puzzles (
                txid, vout, family, payer_address, value, value_usd, confirmed,
                hash_commitment, target, content_type, content_reference, symbol, created_at,
                solved, solved_at, solved_by_address, solved_transaction_id, solution_value,
                score, solved_value_usd
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                record.reference.txid,
                record.reference.vout,
                record.family.as_str(),
                record.payer_address,
                record.value as i64,
                record.value_usd,
                record.confirmed,
                record.hash_commitment,
                record.target,
                record.content_type.map(|c| c.as_str()),
                record.content_reference,
                record.symbol,
                record.created_at,
                record.solved,
                solution.map(|s| s.solved_at),
                solution.and_then(|s| s.solved_by_address.as_deref()),
                solution.map(|s| s.solved_transaction_id.as_str()),
                solution.map(|s| s.solution_value.as_str()),
                solution.map(|s| s.score),
                solution.and_then(|s| s.solved_value_usd),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                Err(StoreError::Duplicate(record.reference.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_confirmed(&self, reference: &OutRef) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE puzzles SET confirmed = 1 WHERE txid = ?1 AND vout = ?2",
            params![reference.txid, reference.vout],
        )?;
        Ok(updated == 1)
    }

    async fn apply_solution(
        &self,
        reference: &OutRef,
        solution: &Solution,
    ) -> Result<SolveWrite, StoreError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE puzzles SET
                solved = 1, solved_at = ?3, solved_by_address = ?4, solved_transaction_id = ?5,
                solution_value = ?6, score = ?7, solved_value_usd = ?8
             WHERE txid = ?1 AND vout = ?2 AND solved = 0",
            params![
                reference.txid,
                reference.vout,
                solution.solved_at,
                solution.solved_by_address,
                solution.solved_transaction_id,
                solution.solution_value,
                solution.score,
                solution.solved_value_usd,
            ],
        )?;
        if updated == 1 {
            return Ok(SolveWrite::Applied);
        }

        let exists = conn
            .query_row(
                "SELECT 1 FROM puzzles WHERE txid = ?1 AND vout = ?2",
                params![reference.txid, reference.vout],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(if exists {
            SolveWrite::AlreadySolved
        } else {
            SolveWrite::Missing
        })
    }

    async fn unsolved(&self) -> Result<Vec<OutRef>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT txid, vout FROM puzzles WHERE solved = 0 ORDER BY txid, vout")?;
        let refs = stmt
            .query_map([], |row| Ok(OutRef::new(row.get::<_, String>(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::fixtures::{open_record, solution};
    use crate::puzzle::content::ContentType;

    #[tokio::test]
    async fn test_round_trip_record() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = open_record("aa", 2);
        record.content_type = Some(ContentType::Bitsv);
        record.content_reference = Some("cc".into());
        record.symbol = Some("\u{1f525}".into());
        record.value_usd = Some(0.25);
        store.insert(&record).await.unwrap();

        let loaded = store.get(&record.reference).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_duplicate_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = open_record("aa", 0);
        store.insert(&record).await.unwrap();

        let err = store.insert(&record).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate(record.reference));
    }

    #[tokio::test]
    async fn test_conditional_solve() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = open_record("aa", 0);
        store.insert(&record).await.unwrap();

        assert_eq!(
            store.apply_solution(&record.reference, &solution(1e4)).await.unwrap(),
            SolveWrite::Applied
        );
        assert_eq!(
            store.apply_solution(&record.reference, &solution(-5.0)).await.unwrap(),
            SolveWrite::AlreadySolved
        );
        assert_eq!(
            store.apply_solution(&OutRef::new("zz", 0), &solution(1.0)).await.unwrap(),
            SolveWrite::Missing
        );

        let loaded = store.get(&record.reference).await.unwrap().unwrap();
        assert!(loaded.solved);
        assert_eq!(loaded.solution, Some(solution(1e4)));
    }

    #[tokio::test]
    async fn test_confirm_and_unsolved() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&open_record("aa", 0)).await.unwrap();
        store.insert(&open_record("bb", 1)).await.unwrap();
        store.apply_solution(&OutRef::new("aa", 0), &solution(1.0)).await.unwrap();

        assert!(store.set_confirmed(&OutRef::new("bb", 1)).await.unwrap());
        assert!(!store.set_confirmed(&OutRef::new("cc", 0)).await.unwrap());
        assert_eq!(store.unsolved().await.unwrap(), vec![OutRef::new("bb", 1)]);
    }

    #[tokio::test]
    async fn test_reopen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puzzles.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&open_record("aa", 0)).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.unsolved().await.unwrap(), vec![OutRef::new("aa", 0)]);
    }
}
