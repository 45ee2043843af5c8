//! Puzzle Records
//!
//! Persisted shape of a puzzle and of its solution.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::puzzle::classify::PuzzleFamily;
use crate::puzzle::content::ContentType;

// =============================================================================
// OUTPUT REFERENCE
// =============================================================================

/// Spendable output reference: `(txid, vout)`.
///
/// Implements Ord for deterministic iteration in the open index.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutRef {
    /// Creating transaction id.
    pub txid: String,
    /// Output index.
    pub vout: u32,
}

impl OutRef {
    /// Create a reference.
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for OutRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for OutRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, vout) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("missing ':' in {s:?}"))?;
        let vout = vout
            .parse()
            .map_err(|e| format!("bad output index in {s:?}: {e}"))?;
        Ok(OutRef::new(txid, vout))
    }
}

// =============================================================================
// SOLUTION
// =============================================================================

/// Fields written once, when a puzzle is solved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// When the solving transaction was observed (Unix seconds).
    pub solved_at: i64,
    /// Address of the solver.
    pub solved_by_address: Option<String>,
    /// Solving transaction id.
    pub solved_transaction_id: String,
    /// Hex SHA-256 of the revealed value.
    pub solution_value: String,
    /// `10^depth`, negative for undesirable symbols.
    pub score: f64,
    /// Display value at solve time.
    pub solved_value_usd: Option<f64>,
}

// =============================================================================
// PUZZLE RECORD
// =============================================================================

/// A puzzle output and its lifecycle state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    /// Unique key.
    pub reference: OutRef,
    /// Script family.
    pub family: PuzzleFamily,
    /// Address of the creating transaction's first input.
    pub payer_address: Option<String>,
    /// Satoshis locked.
    pub value: u64,
    /// Display value at creation.
    pub value_usd: Option<f64>,
    /// In a block.
    pub confirmed: bool,
    /// Hex of the first script push.
    pub hash_commitment: String,
    /// Hex of the second script push.
    pub target: String,
    /// Content the puzzle is attached to.
    pub content_type: Option<ContentType>,
    /// Referenced content txid.
    pub content_reference: Option<String>,
    /// Decoded symbol of the target.
    pub symbol: Option<String>,
    /// Block time or ingestion time (Unix seconds).
    pub created_at: i64,
    /// Terminal flag.
    pub solved: bool,
    /// Set exactly when `solved` is.
    pub solution: Option<Solution>,
}

impl PuzzleRecord {
    /// Apply a solution if the record is still open.
    ///
    /// Returns false, leaving the record untouched, if it was already solved.
    pub fn apply_solution(&mut self, solution: &Solution) -> bool {
        if self.solved {
            return false;
        }
        self.solved = true;
        self.solution = Some(solution.clone());
        true
    }
}
