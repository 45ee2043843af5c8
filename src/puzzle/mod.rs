//! Puzzle Recognition Module
//!
//! Pure functions over transaction data. No I/O, no chain state.
//!
//! ## Module Structure
//!
//! - `classify`: Puzzle locking script templates
//! - `content`: Content type and content reference resolution
//! - `score`: Solution depth and score

pub mod classify;
pub mod content;
pub mod score;

// Re-export key types
pub use classify::{classify, classify_asm, extract_terms, is_puzzle, PuzzleFamily, PuzzleTerms};
pub use content::{ContentInfo, ContentType, Slots};
pub use score::{match_depth, score, SymbolClass};
