//! Transaction Stream Driver
//!
//! The upstream source delivers transactions one at a time, in block order,
//! with mempool arrivals ahead of their confirmation. The driver hands them to
//! a [`StreamHandler`] from a single task and awaits each to completion before
//! pulling the next, so ledger mutations never interleave.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument};

use crate::ingest::event::TxEvent;

/// Callbacks of the ingestion contract.
#[async_trait]
pub trait StreamHandler: Send {
    /// Handler failure type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Called once before the first transaction.
    async fn on_start(&mut self) -> Result<(), Self::Error>;

    /// Called once per transaction, in order. `Ok(true)` acknowledges it.
    async fn on_transaction(&mut self, tx: &TxEvent) -> Result<bool, Self::Error>;

    /// The stream has reached the chain tip.
    async fn on_caught_up(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Item delivered by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next transaction.
    Transaction(TxEvent),
    /// Backlog processed; now following the tip.
    CaughtUp,
}

/// Stream errors. The driver stops on the first one.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Handler reported a failure.
    #[error("handler failed: {0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),

    /// Handler did not acknowledge a transaction.
    #[error("transaction {0} not accepted")]
    Rejected(String),

    /// A line of input could not be decoded.
    #[error("invalid event on line {line}: {source}")]
    Decode {
        /// 1-based line number.
        line: usize,
        /// JSON error.
        source: serde_json::Error,
    },

    /// Reading input failed.
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    fn handler<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        StreamError::Handler(Box::new(err))
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Transactions acknowledged.
    pub transactions: u64,
    /// Caught-up notifications seen.
    pub caught_up: u64,
}

/// Run a handler over a stream until it closes or shutdown fires.
///
/// `on_start` completes before anything is read from `events`.
#[instrument(skip_all)]
pub async fn run_stream<H: StreamHandler>(
    handler: &mut H,
    mut events: mpsc::Receiver<StreamEvent>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<StreamStats, StreamError> {
    handler.on_start().await.map_err(StreamError::handler)?;
    info!("Stream handler started");

    let mut stats = StreamStats::default();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(StreamEvent::Transaction(tx)) => {
                        let accepted = handler
                            .on_transaction(&tx)
                            .await
                            .map_err(StreamError::handler)?;
                        if !accepted {
                            return Err(StreamError::Rejected(tx.txid));
                        }
                        stats.transactions += 1;
                    }
                    Some(StreamEvent::CaughtUp) => {
                        handler.on_caught_up().await.map_err(StreamError::handler)?;
                        stats.caught_up += 1;
                    }
                    None => {
                        info!("Stream closed after {} transactions", stats.transactions);
                        break;
                    }
                }
            }
            // A closed channel means no shutdown source, not a shutdown
            Ok(()) = shutdown.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(stats)
}

/// Decode one JSON line. `{"caught_up": true}` marks the tip.
pub fn decode_line(line: &str) -> Result<StreamEvent, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    if value.get("caught_up").and_then(serde_json::Value::as_bool) == Some(true) {
        return Ok(StreamEvent::CaughtUp);
    }
    serde_json::from_value(value).map(StreamEvent::Transaction)
}

/// Feed a channel from a JSON-lines source, one event per line.
///
/// Blank lines are skipped. Returns the number of events sent; stops early if
/// the receiving side has gone away.
pub async fn read_json_lines<R: AsyncBufRead + Unpin>(
    reader: R,
    sender: mpsc::Sender<StreamEvent>,
) -> Result<usize, StreamError> {
    let mut lines = reader.lines();
    let mut line_no = 0;
    let mut sent = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = decode_line(line).map_err(|source| StreamError::Decode {
            line: line_no,
            source,
        })?;
        if sender.send(event).await.is_err() {
            debug!("Stream receiver dropped at line {}", line_no);
            break;
        }
        sent += 1;
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[derive(Default)]
    struct Recorder {
        started: bool,
        seen: Vec<String>,
        caught_up: bool,
        fail_on: Option<String>,
        reject_on: Option<String>,
    }

    #[async_trait]
    impl StreamHandler for Recorder {
        type Error = Boom;

        async fn on_start(&mut self) -> Result<(), Boom> {
            self.started = true;
            Ok(())
        }

        async fn on_transaction(&mut self, tx: &TxEvent) -> Result<bool, Boom> {
            assert!(self.started, "transaction before start");
            if self.fail_on.as_deref() == Some(tx.txid.as_str()) {
                return Err(Boom);
            }
            self.seen.push(tx.txid.clone());
            Ok(self.reject_on.as_deref() != Some(tx.txid.as_str()))
        }

        async fn on_caught_up(&mut self) -> Result<(), Boom> {
            self.caught_up = true;
            Ok(())
        }
    }

    fn tx(txid: &str) -> StreamEvent {
        StreamEvent::Transaction(TxEvent {
            txid: txid.into(),
            inputs: vec![],
            outputs: vec![],
            block: None,
        })
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let (tx_send, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        for id in ["a", "b", "c"] {
            tx_send.send(tx(id)).await.unwrap();
        }
        tx_send.send(StreamEvent::CaughtUp).await.unwrap();
        drop(tx_send);

        let mut handler = Recorder::default();
        let stats = run_stream(&mut handler, rx, shutdown_rx).await.unwrap();

        assert_eq!(handler.seen, vec!["a", "b", "c"]);
        assert!(handler.caught_up);
        assert_eq!(stats, StreamStats { transactions: 3, caught_up: 1 });
    }

    #[tokio::test]
    async fn test_handler_error_halts_stream() {
        let (tx_send, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        for id in ["a", "bad", "c"] {
            tx_send.send(tx(id)).await.unwrap();
        }
        drop(tx_send);

        let mut handler = Recorder {
            fail_on: Some("bad".into()),
            ..Default::default()
        };
        let err = run_stream(&mut handler, rx, shutdown_rx).await.unwrap_err();

        assert!(matches!(err, StreamError::Handler(_)));
        assert_eq!(handler.seen, vec!["a"]);
    }

    #[tokio::test]
    async fn test_rejection_halts_stream() {
        let (tx_send, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tx_send.send(tx("a")).await.unwrap();
        tx_send.send(tx("b")).await.unwrap();
        drop(tx_send);

        let mut handler = Recorder {
            reject_on: Some("a".into()),
            ..Default::default()
        };
        let err = run_stream(&mut handler, rx, shutdown_rx).await.unwrap_err();
        assert!(matches!(err, StreamError::Rejected(ref id) if id == "a"));
        assert_eq!(handler.seen, vec!["a"]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_driver() {
        let (_tx_send, rx) = mpsc::channel::<StreamEvent>(8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        let mut handler = Recorder::default();
        let stats = run_stream(&mut handler, rx, shutdown_rx).await.unwrap();
        assert!(handler.started);
        assert_eq!(stats.transactions, 0);
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_keeps_draining() {
        let (tx_send, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        drop(shutdown_tx);

        let feeder = tokio::spawn(async move {
            for id in ["a", "b", "c"] {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                tx_send.send(tx(id)).await.unwrap();
            }
        });

        let mut handler = Recorder::default();
        let stats = run_stream(&mut handler, rx, shutdown_rx).await.unwrap();
        feeder.await.unwrap();

        assert_eq!(handler.seen, vec!["a", "b", "c"]);
        assert_eq!(stats.transactions, 3);
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(r#"{"caught_up": true}"#).unwrap(), StreamEvent::CaughtUp);
        assert_eq!(decode_line(r#"{"txid": "a"}"#).unwrap(), tx("a"));
        assert!(decode_line(r#"{"caught_up": false}"#).is_err());
        assert!(decode_line("not json").is_err());
    }

    #[tokio::test]
    async fn test_read_json_lines() {
        let input = b"{\"txid\": \"a\"}\n\n{\"txid\": \"b\"}\n{\"caught_up\": true}\n";
        let (sender, mut rx) = mpsc::channel(8);

        let sent = read_json_lines(&input[..], sender).await.unwrap();
        assert_eq!(sent, 3);
        assert_eq!(rx.recv().await, Some(tx("a")));
        assert_eq!(rx.recv().await, Some(tx("b")));
        assert_eq!(rx.recv().await, Some(StreamEvent::CaughtUp));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_read_json_lines_reports_bad_line() {
        let input = b"{\"txid\": \"a\"}\n{oops\n";
        let (sender, _rx) = mpsc::channel(8);

        let err = read_json_lines(&input[..], sender).await.unwrap_err();
        assert!(matches!(err, StreamError::Decode { line: 2, .. }));
    }
}
