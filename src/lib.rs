//! # POW Market Indexer
//!
//! Watches a transaction stream for proof-of-work puzzle outputs, records
//! each one as an open puzzle, and scores it when a later transaction spends
//! it by revealing a value.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     POW MARKET INDEXER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Script primitives                         │
//! │  ├── script.rs   - Opcodes, ASM parsing                      │
//! │  └── hash.rs     - sha256 of revealed values                 │
//! │                                                              │
//! │  puzzle/         - Pure puzzle logic                         │
//! │  ├── classify.rs - Template matching, term extraction        │
//! │  ├── content.rs  - Content type/reference from data outputs  │
//! │  └── score.rs    - Match depth and score                     │
//! │                                                              │
//! │  ledger/         - Puzzle lifecycle                          │
//! │  ├── record.rs   - Record and solution types                 │
//! │  ├── store.rs    - Store trait, in-memory store              │
//! │  └── sqlite.rs   - SQLite store                              │
//! │                                                              │
//! │  ingest/         - Stream side                               │
//! │  ├── event.rs    - Transaction events                        │
//! │  ├── enrich.rs   - Price quote, symbol table                 │
//! │  ├── pipeline.rs - Per-transaction processing                │
//! │  └── stream.rs   - Stream driver, JSON-lines reader          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering
//!
//! Transactions are applied strictly one at a time in stream order. Within a
//! transaction, spent inputs are checked before outputs are classified.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod ingest;
pub mod ledger;
pub mod puzzle;

// Re-export commonly used types
pub use config::IndexerConfig;
pub use core::script::{parse_asm, Script};
pub use ingest::{IngestionPipeline, StreamHandler, TxEvent};
pub use ledger::{OutRef, PuzzleLedger, PuzzleRecord, Solution};
pub use puzzle::{classify_asm, PuzzleFamily, PuzzleTerms, SymbolClass};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
