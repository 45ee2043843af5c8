//! Enrichment Services
//!
//! Best-effort lookups that decorate records: a price quote for display
//! values and a symbol table for targets that spell a code point. Failures
//! here never block a ledger transition.

use std::collections::BTreeMap;
use std::path::Path;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::puzzle::score::SymbolClass;

/// Satoshis per coin.
pub const SATS_PER_COIN: f64 = 100_000_000.0;

/// Enrichment lookup errors.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// No quote source configured.
    #[error("price quote unavailable")]
    QuoteUnavailable,

    /// Lookup failed.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// Symbol table file unreadable.
    #[error("failed to read symbol table: {0}")]
    Io(#[from] std::io::Error),

    /// Symbol table file malformed.
    #[error("invalid symbol table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of the current coin price.
#[async_trait]
pub trait PriceQuote: Send + Sync {
    /// Display currency per coin.
    async fn current_quote(&self) -> Result<f64, EnrichmentError>;
}

/// Convert satoshis to display currency at `rate`.
pub fn sats_to_display(sats: u64, rate: f64) -> f64 {
    sats as f64 / SATS_PER_COIN * rate
}

/// Quote that never changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedQuote(pub f64);

#[async_trait]
impl PriceQuote for FixedQuote {
    async fn current_quote(&self) -> Result<f64, EnrichmentError> {
        Ok(self.0)
    }
}

/// No quote source; every lookup fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQuote;

#[async_trait]
impl PriceQuote for NoQuote {
    async fn current_quote(&self) -> Result<f64, EnrichmentError> {
        Err(EnrichmentError::QuoteUnavailable)
    }
}

/// Classifier for targets that may spell a symbol.
#[async_trait]
pub trait SymbolTable: Send + Sync {
    /// Classify a target (hex code point candidate).
    async fn classify(&self, candidate: &str) -> Result<SymbolClass, EnrichmentError>;
}

/// On-disk shape of a symbol table.
#[derive(Debug, Default, Deserialize)]
struct SymbolFile {
    #[serde(default)]
    undesirable: Vec<String>,
    #[serde(default)]
    notable: Vec<String>,
}

/// Symbol table held in memory, keyed by lowercase hex code point.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbolTable {
    entries: BTreeMap<String, SymbolClass>,
}

impl StaticSymbolTable {
    /// Empty table: nothing is a symbol.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    pub fn with(mut self, code_point: &str, class: SymbolClass) -> Self {
        self.entries.insert(code_point.to_ascii_lowercase(), class);
        self
    }

    /// Parse `{"undesirable": [...], "notable": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, EnrichmentError> {
        let file: SymbolFile = serde_json::from_str(json)?;
        let mut table = Self::new();
        for cp in &file.notable {
            table = table.with(cp, SymbolClass::Notable);
        }
        // Undesirable wins when a code point is listed twice
        for cp in &file.undesirable {
            table = table.with(cp, SymbolClass::Undesirable);
        }
        Ok(table)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EnrichmentError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SymbolTable for StaticSymbolTable {
    async fn classify(&self, candidate: &str) -> Result<SymbolClass, EnrichmentError> {
        Ok(self
            .entries
            .get(&candidate.to_ascii_lowercase())
            .copied()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sats_to_display() {
        assert_eq!(sats_to_display(100_000_000, 250.0), 250.0);
        assert_eq!(sats_to_display(50_000_000, 100.0), 50.0);
        assert_eq!(sats_to_display(0, 100.0), 0.0);
    }

    #[tokio::test]
    async fn test_quotes() {
        assert_eq!(FixedQuote(123.0).current_quote().await.unwrap(), 123.0);
        assert!(matches!(
            NoQuote.current_quote().await,
            Err(EnrichmentError::QuoteUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_symbol_table_from_json() {
        let table = StaticSymbolTable::from_json(
            r#"{"undesirable": ["1F4A9"], "notable": ["1f525", "1f4a9"]}"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.classify("1f4a9").await.unwrap(), SymbolClass::Undesirable);
        assert_eq!(table.classify("1F525").await.unwrap(), SymbolClass::Notable);
        assert_eq!(table.classify("21e8").await.unwrap(), SymbolClass::None);
    }

    #[test]
    fn test_symbol_table_bad_json() {
        assert!(matches!(
            StaticSymbolTable::from_json("[1, 2]"),
            Err(EnrichmentError::Parse(_))
        ));
    }
}
