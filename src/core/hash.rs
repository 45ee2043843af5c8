//! Puzzle Hashing
//!
//! SHA-256 helpers for revealed puzzle values. Puzzle scripts commit with
//! `OP_SHA256`, so the solution value of a redemption is the hex digest of
//! the first item pushed by the unlocking script.

use sha2::{Digest, Sha256};

/// Hash output type (256 bits / 32 bytes)
pub type Hash256 = [u8; 32];

/// Compute a SHA-256 of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex SHA-256 of a revealed value.
pub fn solution_hex(revealed: &[u8]) -> String {
    hex::encode(hash_bytes(revealed))
}
