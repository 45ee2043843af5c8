//! Transaction Events
//!
//! Wire format of the upstream transaction stream. One [`TxEvent`] per
//! transaction, JSON encoded, carrying already-decoded scripts (ASM) and the
//! per-output metadata slots produced by the metadata protocol.

use serde::{Deserialize, Serialize};

use crate::ledger::record::OutRef;
use crate::puzzle::content::Slots;

static NO_SLOTS: Slots = Slots::new();

/// Block that confirmed a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block height.
    pub height: u64,
    /// Block time (Unix seconds).
    pub time: i64,
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Txid of the output being spent.
    pub prev_txid: String,
    /// Index of the output being spent.
    pub prev_vout: u32,
    /// Address of the spender, when the stream could derive one.
    #[serde(default)]
    pub address: Option<String>,
    /// Unlocking script as ASM.
    #[serde(default)]
    pub script: String,
}

impl TxInput {
    /// Reference of the output this input spends.
    pub fn spent_ref(&self) -> OutRef {
        OutRef::new(self.prev_txid.clone(), self.prev_vout)
    }
}

/// A transaction output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in satoshis.
    pub value: u64,
    /// Locking script as ASM.
    #[serde(default)]
    pub script: String,
    /// Decoded string pushes, keyed by position (`s0`, `s1`, ...).
    #[serde(default)]
    pub slots: Slots,
}

impl TxOutput {
    /// String pushed at slot `index`.
    pub fn slot(&self, index: u32) -> Option<&str> {
        self.slots.get(&index).map(String::as_str)
    }
}

/// A transaction delivered by the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    /// Transaction id (hex).
    pub txid: String,
    /// Inputs in order.
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    /// Outputs in order; the position is the output index.
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
    /// Confirming block, `None` while in the mempool.
    #[serde(default)]
    pub block: Option<BlockInfo>,
}

impl TxEvent {
    /// True once the transaction is in a block.
    pub fn is_confirmed(&self) -> bool {
        self.block.is_some()
    }

    /// Block time if confirmed, otherwise `now`.
    pub fn observed_at(&self, now: i64) -> i64 {
        self.block.as_ref().map(|b| b.time).unwrap_or(now)
    }

    /// Metadata slots of the first output, where attached content is tagged.
    pub fn metadata_slots(&self) -> &Slots {
        self.outputs.first().map(|o| &o.slots).unwrap_or(&NO_SLOTS)
    }

    /// Address of the first input, used as the payer of created puzzles.
    pub fn payer_address(&self) -> Option<&str> {
        self.inputs.first().and_then(|i| i.address.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_stream_json() {
        let json = r#"{
            "txid": "aa",
            "inputs": [{"prev_txid": "bb", "prev_vout": 1, "address": "1Payer", "script": "3044"}],
            "outputs": [{"value": 546, "script": "OP_RETURN", "slots": {"2": "meta"}}],
            "block": {"height": 624058, "time": 1582000000}
        }"#;
        let event: TxEvent = serde_json::from_str(json).unwrap();

        assert!(event.is_confirmed());
        assert_eq!(event.observed_at(0), 1582000000);
        assert_eq!(event.payer_address(), Some("1Payer"));
        assert_eq!(event.inputs[0].spent_ref(), OutRef::new("bb", 1));
        assert_eq!(event.outputs[0].slot(2), Some("meta"));
        assert_eq!(event.outputs[0].slot(3), None);
        assert_eq!(event.metadata_slots().get(&2).map(String::as_str), Some("meta"));
    }

    #[test]
    fn test_mempool_event_uses_now() {
        let event: TxEvent = serde_json::from_str(r#"{"txid": "aa"}"#).unwrap();
        assert!(!event.is_confirmed());
        assert_eq!(event.observed_at(42), 42);
        assert_eq!(event.payer_address(), None);
        assert!(event.metadata_slots().is_empty());
    }
}
