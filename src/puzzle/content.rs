//! Content Resolution
//!
//! Puzzles can be attached to content published through a metadata protocol.
//! The resolver reads the string slots of the transaction's first output and
//! decides what, if anything, the puzzle is attached to.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decoded string pushes of one output, keyed by position (`s0`, `s1`, ...).
pub type Slots = BTreeMap<u32, String>;

/// Bitcom protocol prefix of bit.sv content.
pub const BITSV_PROTOCOL: &str = "1L8eNuA8ToLGK5aV4d5d9rXUAbRZUxKrhF";

/// Slots that may carry the protocol prefix.
const PROTOCOL_SLOTS: [u32; 2] = [6, 2];
/// Slot tagged `meta` for metadata puzzles.
const META_SLOT: u32 = 2;
/// Slot marking the transaction itself as the content.
const CONTENT_SLOT: u32 = 11;
/// Slots of a `receipt txid <id>` triple.
const RECEIPT_SLOTS: (u32, u32, u32) = (7, 8, 9);

/// What a puzzle is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Nothing recognised. Never persisted.
    Unknown,
    /// Output tagged `meta`.
    Meta,
    /// bit.sv content reference.
    Bitsv,
}

impl ContentType {
    /// Stored name.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Unknown => "unknown",
            ContentType::Meta => "meta",
            ContentType::Bitsv => "bitsv",
        }
    }

    /// `None` for [`ContentType::Unknown`], which is not stored.
    pub fn known(self) -> Option<ContentType> {
        match self {
            ContentType::Unknown => None,
            other => Some(other),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(ContentType::Unknown),
            "meta" => Ok(ContentType::Meta),
            "bitsv" => Ok(ContentType::Bitsv),
            other => Err(format!("unknown content type {other:?}")),
        }
    }
}

/// Resolved content fields for a puzzle record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentInfo {
    /// Content type, `None` when unknown.
    pub content_type: Option<ContentType>,
    /// Referenced content txid.
    pub content_reference: Option<String>,
}

fn slot(slots: &Slots, index: u32) -> Option<&str> {
    slots.get(&index).map(String::as_str)
}

/// Classify the content a transaction's puzzles are attached to, from the
/// slots of its first output.
pub fn content_type(slots: &Slots) -> ContentType {
    if PROTOCOL_SLOTS.iter().any(|&i| slot(slots, i) == Some(BITSV_PROTOCOL)) {
        ContentType::Bitsv
    } else if slot(slots, META_SLOT) == Some("meta") {
        ContentType::Meta
    } else {
        ContentType::Unknown
    }
}

/// Extract the referenced content txid. Only bit.sv content has one.
pub fn content_reference(txid: &str, slots: &Slots) -> Option<String> {
    if content_type(slots) != ContentType::Bitsv {
        return None;
    }

    if slot(slots, CONTENT_SLOT) == Some("content") {
        return Some(txid.to_string());
    }

    let (receipt, txid_tag, id) = RECEIPT_SLOTS;
    if slot(slots, receipt) == Some("receipt") && slot(slots, txid_tag) == Some("txid") {
        if let Some(reference) = slot(slots, id) {
            return Some(reference.to_string());
        }
    }

    debug!("no bit.sv content txid in {}", txid);
    None
}

/// Resolve both content fields.
pub fn resolve(txid: &str, slots: &Slots) -> ContentInfo {
    ContentInfo {
        content_type: content_type(slots).known(),
        content_reference: content_reference(txid, slots),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "c0ffee";

    fn slots(pairs: &[(u32, &str)]) -> Slots {
        pairs.iter().map(|(i, s)| (*i, s.to_string())).collect()
    }

    #[test]
    fn test_unknown_without_tags() {
        let out = slots(&[(0, "hello")]);
        assert_eq!(content_type(&out), ContentType::Unknown);
        assert_eq!(resolve(TXID, &out), ContentInfo::default());
    }

    #[test]
    fn test_no_slots() {
        let empty = Slots::new();
        assert_eq!(content_type(&empty), ContentType::Unknown);
        assert_eq!(content_reference(TXID, &empty), None);
    }

    #[test]
    fn test_meta_tag() {
        let out = slots(&[(2, "meta"), (11, "content")]);
        assert_eq!(content_type(&out), ContentType::Meta);
        // Only bit.sv content carries a reference
        assert_eq!(content_reference(TXID, &out), None);
    }

    #[test]
    fn test_protocol_in_either_slot() {
        let out = slots(&[(2, BITSV_PROTOCOL)]);
        assert_eq!(content_type(&out), ContentType::Bitsv);

        let out = slots(&[(2, "meta"), (6, BITSV_PROTOCOL)]);
        assert_eq!(content_type(&out), ContentType::Bitsv);
    }

    #[test]
    fn test_self_content_reference() {
        let out = slots(&[(6, BITSV_PROTOCOL), (11, "content")]);
        assert_eq!(content_reference(TXID, &out), Some("c0ffee".into()));
    }

    #[test]
    fn test_receipt_reference() {
        let out = slots(&[(6, BITSV_PROTOCOL), (7, "receipt"), (8, "txid"), (9, "deadbeef")]);
        let info = resolve(TXID, &out);
        assert_eq!(info.content_type, Some(ContentType::Bitsv));
        assert_eq!(info.content_reference, Some("deadbeef".into()));
    }

    #[test]
    fn test_content_slot_wins_over_receipt() {
        let out = slots(&[
            (2, BITSV_PROTOCOL),
            (7, "receipt"),
            (8, "txid"),
            (9, "deadbeef"),
            (11, "content"),
        ]);
        assert_eq!(content_reference(TXID, &out), Some("c0ffee".into()));
    }

    #[test]
    fn test_unresolvable_reference() {
        let out = slots(&[(6, BITSV_PROTOCOL), (7, "receipt")]);
        let info = resolve(TXID, &out);
        assert_eq!(info.content_type, Some(ContentType::Bitsv));
        assert_eq!(info.content_reference, None);
    }
}
