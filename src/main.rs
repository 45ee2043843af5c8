//! POW Market Indexer
//!
//! Reads transactions as JSON lines on stdin and maintains the puzzle ledger.
//! Configuration comes from `POW_*` environment variables.

use std::sync::Arc;
use anyhow::Context;
use tokio::io::BufReader;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pow_market::{
    config::IndexerConfig,
    ingest::{
        read_json_lines, run_stream, FixedQuote, IngestionPipeline, NoQuote, PriceQuote,
        StaticSymbolTable,
    },
    ledger::{MemoryStore, PuzzleLedger, PuzzleStore, SqliteStore},
    VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pow_market=info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("POW Market Indexer v{}", VERSION);

    let config = IndexerConfig::from_env();

    let store: Arc<dyn PuzzleStore> = match &config.db_path {
        Some(path) => {
            info!("Using database {}", path.display());
            Arc::new(
                SqliteStore::open(path)
                    .with_context(|| format!("failed to open database {}", path.display()))?,
            )
        }
        None => {
            warn!("POW_DB_PATH not set, ledger will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let quotes: Arc<dyn PriceQuote> = match config.quote_usd {
        Some(rate) => {
            info!("Display values at {} per coin", rate);
            Arc::new(FixedQuote(rate))
        }
        None => Arc::new(NoQuote),
    };

    let symbols = match &config.symbols_path {
        Some(path) => StaticSymbolTable::load(path)
            .with_context(|| format!("failed to load symbol table {}", path.display()))?,
        None => StaticSymbolTable::new(),
    };
    info!("Symbol table: {} entries", symbols.len());

    let mut pipeline = IngestionPipeline::new(PuzzleLedger::new(store), quotes, Arc::new(symbols));

    let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let reader = tokio::spawn(read_json_lines(BufReader::new(tokio::io::stdin()), event_tx));

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(e) => warn!("Ctrl-C handler unavailable, running until input ends: {}", e),
        }
    });

    let stats = match run_stream(&mut pipeline, event_rx, shutdown_rx).await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Stream halted: {}", e);
            reader.abort();
            return Err(e).context("stream halted");
        }
    };

    // A finished reader keeps its result; one still blocked on stdin is cancelled
    reader.abort();
    match reader.await {
        Ok(result) => {
            let events = result.context("failed to read transaction stream")?;
            info!("Read {} events", events);
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => return Err(e).context("reader task panicked"),
    }

    info!(
        "Processed {} transactions, {} puzzles still open",
        stats.transactions,
        pipeline.ledger().open_count()
    );
    Ok(())
}
