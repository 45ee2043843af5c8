//! Transaction ingestion.
//!
//! Everything between the upstream transaction stream and the ledger:
//! decoded events, enrichment lookups, the pipeline that applies one
//! transaction at a time, and the driver that feeds it.

pub mod enrich;
pub mod event;
pub mod pipeline;
pub mod stream;

pub use enrich::{FixedQuote, NoQuote, PriceQuote, StaticSymbolTable, SymbolTable};
pub use event::{BlockInfo, TxEvent, TxInput, TxOutput};
pub use pipeline::{IngestionPipeline, PipelineError, TxSummary};
pub use stream::{read_json_lines, run_stream, StreamError, StreamEvent, StreamHandler, StreamStats};
