//! Ingestion Pipeline
//!
//! Applies one transaction at a time to the ledger. Spent inputs are checked
//! first (a transaction can solve a puzzle and create new ones), then every
//! output is classified.

use std::sync::Arc;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::hash::solution_hex;
use crate::core::script::{parse_asm, ScriptError};
use crate::ingest::enrich::{sats_to_display, PriceQuote, SymbolTable};
use crate::ingest::event::{TxEvent, TxInput};
use crate::ingest::stream::StreamHandler;
use crate::ledger::{
    LedgerError, OpenOutcome, OutRef, PuzzleLedger, PuzzleRecord, Solution, SolveOutcome,
};
use crate::puzzle::classify::extract_terms;
use crate::puzzle::content::{self, ContentInfo};
use crate::puzzle::score::{decode_symbol, score_solution, SymbolClass};

/// Pipeline errors. Every variant halts the stream.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transaction delivered before hydration.
    #[error("transaction {0} delivered before the ledger was hydrated")]
    NotStarted(String),

    /// Ledger transition failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The input spending an open puzzle could not be parsed.
    #[error("unparseable unlocking script for {reference} in {txid}: {source}")]
    UnlockingScript {
        /// Puzzle being spent.
        reference: OutRef,
        /// Spending transaction.
        txid: String,
        /// Parse failure.
        source: ScriptError,
    },

    /// The input spending an open puzzle pushes no value first.
    #[error("no revealed value for {reference} in {txid}")]
    MissingReveal {
        /// Puzzle being spent.
        reference: OutRef,
        /// Spending transaction.
        txid: String,
    },
}

/// What one transaction changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxSummary {
    /// Puzzles solved.
    pub solved: usize,
    /// Puzzles created.
    pub opened: usize,
    /// Existing puzzles confirmed.
    pub reconfirmed: usize,
}

impl TxSummary {
    /// True if the transaction touched no puzzle.
    pub fn is_empty(&self) -> bool {
        self.solved == 0 && self.opened == 0 && self.reconfirmed == 0
    }
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Orchestrates classification, scoring and ledger transitions.
pub struct IngestionPipeline {
    ledger: PuzzleLedger,
    quotes: Arc<dyn PriceQuote>,
    symbols: Arc<dyn SymbolTable>,
    clock: Clock,
}

impl IngestionPipeline {
    /// Create a pipeline over a (not yet hydrated) ledger.
    pub fn new(
        ledger: PuzzleLedger,
        quotes: Arc<dyn PriceQuote>,
        symbols: Arc<dyn SymbolTable>,
    ) -> Self {
        Self {
            ledger,
            quotes,
            symbols,
            clock: Box::new(|| chrono::Utc::now().timestamp()),
        }
    }

    /// Replace the ingestion-time clock.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The ledger.
    pub fn ledger(&self) -> &PuzzleLedger {
        &self.ledger
    }

    /// Hydrate the ledger. Must run before the first transaction.
    pub async fn start(&mut self) -> Result<usize, PipelineError> {
        Ok(self.ledger.hydrate().await?)
    }

    /// Apply one transaction.
    pub async fn process(&mut self, tx: &TxEvent) -> Result<TxSummary, PipelineError> {
        if !self.ledger.is_hydrated() {
            return Err(PipelineError::NotStarted(tx.txid.clone()));
        }

        let now = (self.clock)();
        let mut summary = TxSummary::default();

        for input in &tx.inputs {
            let reference = input.spent_ref();
            if self.ledger.is_open(&reference) {
                if self.solve(tx, input, reference, now).await? == SolveOutcome::Solved {
                    summary.solved += 1;
                }
            }
        }

        let mut resolved: Option<ContentInfo> = None;
        for (vout, output) in tx.outputs.iter().enumerate() {
            let Some(terms) = parse_asm(&output.script).ok().as_ref().and_then(extract_terms)
            else {
                continue;
            };

            let content = resolved
                .get_or_insert_with(|| content::resolve(&tx.txid, tx.metadata_slots()))
                .clone();
            let record = PuzzleRecord {
                reference: OutRef::new(tx.txid.clone(), vout as u32),
                family: terms.family,
                payer_address: tx.payer_address().map(str::to_string),
                value: output.value,
                value_usd: self.display_value(output.value).await,
                confirmed: tx.is_confirmed(),
                symbol: self.symbol_for(&terms.target).await,
                hash_commitment: terms.hash_commitment,
                target: terms.target,
                content_type: content.content_type,
                content_reference: content.content_reference,
                created_at: tx.observed_at(now),
                solved: false,
                solution: None,
            };

            match self.ledger.open_puzzle(record).await? {
                OpenOutcome::Inserted => summary.opened += 1,
                OpenOutcome::Reconfirmed => summary.reconfirmed += 1,
                OpenOutcome::AlreadyKnown => {}
            }
        }

        if !summary.is_empty() {
            debug!("{}: {:?}", tx.txid, summary);
        }
        Ok(summary)
    }

    async fn solve(
        &mut self,
        tx: &TxEvent,
        input: &TxInput,
        reference: OutRef,
        now: i64,
    ) -> Result<SolveOutcome, PipelineError> {
        let script = parse_asm(&input.script).map_err(|source| PipelineError::UnlockingScript {
            reference: reference.clone(),
            txid: tx.txid.clone(),
            source,
        })?;
        let revealed = script.first_push().ok_or_else(|| PipelineError::MissingReveal {
            reference: reference.clone(),
            txid: tx.txid.clone(),
        })?;
        let solution_value = solution_hex(revealed);

        let record = self.ledger.find_open(&reference).await?;
        // Classified from the target, not the stored symbol
        let class = match decode_symbol(&record.target) {
            Some(_) => self.classify_symbol(&record.target).await,
            None => SymbolClass::None,
        };
        let (depth, score) = score_solution(&solution_value, &record.target, class);

        let solution = Solution {
            solved_at: tx.observed_at(now),
            solved_by_address: input.address.clone(),
            solved_transaction_id: tx.txid.clone(),
            solution_value,
            score,
            solved_value_usd: self.display_value(record.value).await,
        };

        let outcome = self.ledger.mark_solved(&reference, &solution).await?;
        if outcome == SolveOutcome::Solved {
            info!(
                "Puzzle {} solved in {}: {} (depth {}, score {})",
                reference, tx.txid, solution.solution_value, depth, score
            );
        }
        Ok(outcome)
    }

    /// Best-effort display value.
    async fn display_value(&self, sats: u64) -> Option<f64> {
        match self.quotes.current_quote().await {
            Ok(rate) => Some(sats_to_display(sats, rate)),
            Err(e) => {
                debug!("No price quote: {}", e);
                None
            }
        }
    }

    /// Best-effort symbol classification of a target.
    async fn classify_symbol(&self, target: &str) -> SymbolClass {
        match self.symbols.classify(target).await {
            Ok(class) => class,
            Err(e) => {
                warn!("Symbol lookup failed for {}: {}", target, e);
                SymbolClass::None
            }
        }
    }

    /// Decoded symbol, kept only when the table recognises the target.
    async fn symbol_for(&self, target: &str) -> Option<String> {
        let symbol = decode_symbol(target)?;
        self.classify_symbol(target)
            .await
            .is_recognised()
            .then_some(symbol)
    }
}

#[async_trait]
impl StreamHandler for IngestionPipeline {
    type Error = PipelineError;

    async fn on_start(&mut self) -> Result<(), PipelineError> {
        self.start().await?;
        Ok(())
    }

    async fn on_transaction(&mut self, tx: &TxEvent) -> Result<bool, PipelineError> {
        self.process(tx).await?;
        Ok(true)
    }

    async fn on_caught_up(&mut self) -> Result<(), PipelineError> {
        info!(
            "Block processing has caught up, {} open puzzles",
            self.ledger.open_count()
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
