//! Indexer configuration.
//!
//! Read from `POW_*` environment variables. Every setting has a default, so
//! an empty environment gives an in-memory indexer with no quote source and
//! an empty symbol table.

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Default capacity of the event channel between reader and driver.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Indexer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    /// SQLite database file. `None` keeps the ledger in memory.
    pub db_path: Option<PathBuf>,
    /// Fixed display-currency quote per coin. `None` disables display values.
    pub quote_usd: Option<f64>,
    /// Symbol table JSON file.
    pub symbols_path: Option<PathBuf>,
    /// Event channel capacity.
    pub channel_capacity: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            quote_usd: None,
            symbols_path: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl IndexerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let quote_usd = non_empty("POW_QUOTE_USD")
            .and_then(|v| parse_or_warn::<f64>("POW_QUOTE_USD", &v))
            .filter(|q| q.is_finite() && *q >= 0.0);

        let channel_capacity = non_empty("POW_CHANNEL_CAPACITY")
            .and_then(|v| parse_or_warn::<usize>("POW_CHANNEL_CAPACITY", &v))
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);

        Self {
            db_path: non_empty("POW_DB_PATH").map(PathBuf::from),
            quote_usd,
            symbols_path: non_empty("POW_SYMBOLS_PATH").map(PathBuf::from),
            channel_capacity,
        }
    }

    /// True if the ledger survives a restart.
    pub fn is_persistent(&self) -> bool {
        self.db_path.is_some()
    }
}

fn parse_or_warn<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}, using default", key, value);
            None
        }
    }
}
