//! Puzzle Script Classification
//!
//! Recognises the two proof-of-work puzzle locking templates. Both reveal a
//! value, hash it with `OP_SHA256`, compare a prefix against the committed
//! target and finish with a signature check:
//!
//! ```text
//! <push> <push> OP_SIZE OP_4 OP_PICK OP_SHA256 OP_SWAP OP_SPLIT
//!               OP_DROP OP_EQUALVERIFY OP_DROP [OP_CODESEPARATOR] OP_CHECKSIG
//! ```
//!
//! Matching is exact. A near miss is not a puzzle: a false positive would put
//! an ordinary spend into the ledger.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::core::script::{parse_asm, Instruction, Opcode, Script};

/// Opcodes shared by both templates, following the two pushes.
const CORE_SEQUENCE: [Opcode; 9] = [
    Opcode::OpSize,
    Opcode::Op4,
    Opcode::OpPick,
    Opcode::OpSha256,
    Opcode::OpSwap,
    Opcode::OpSplit,
    Opcode::OpDrop,
    Opcode::OpEqualVerify,
    Opcode::OpDrop,
];

/// Instruction count of a Family A script.
pub const MINER_SCRIPT_LEN: usize = 12;

/// Minimum instruction count of a Family B script.
pub const CODESEPARATOR_SCRIPT_MIN_LEN: usize = 13;

/// Recognised puzzle script families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PuzzleFamily {
    /// Family A: 12 instructions ending in `OP_CHECKSIG`.
    #[serde(rename = "21e8miner")]
    Miner21e8,
    /// Family B: `OP_CODESEPARATOR` before the final `OP_CHECKSIG`.
    #[serde(rename = "brendanlee")]
    CodeSeparator,
}

impl PuzzleFamily {
    /// Stored name of the family.
    pub fn as_str(self) -> &'static str {
        match self {
            PuzzleFamily::Miner21e8 => "21e8miner",
            PuzzleFamily::CodeSeparator => "brendanlee",
        }
    }
}

impl fmt::Display for PuzzleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PuzzleFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "21e8miner" => Ok(PuzzleFamily::Miner21e8),
            "brendanlee" => Ok(PuzzleFamily::CodeSeparator),
            other => Err(format!("unknown puzzle family {other:?}")),
        }
    }
}

/// The success condition committed by a puzzle script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PuzzleTerms {
    /// Family the script matched.
    pub family: PuzzleFamily,
    /// Hex of the first push.
    pub hash_commitment: String,
    /// Hex of the second push.
    pub target: String,
}

fn ops_match(instructions: &[Instruction], expected: &[Opcode]) -> bool {
    instructions.len() == expected.len()
        && instructions
            .iter()
            .zip(expected)
            .all(|(ins, op)| matches!(ins, Instruction::Op(actual) if actual == op))
}

fn is_miner_script(instructions: &[Instruction]) -> bool {
    if instructions.len() != MINER_SCRIPT_LEN {
        return false;
    }
    match instructions {
        [Instruction::Push(sig), Instruction::Push(target), core @ .., Instruction::Op(Opcode::OpCheckSig)] => {
            !sig.is_empty() && !target.is_empty() && ops_match(core, &CORE_SEQUENCE)
        }
        _ => false,
    }
}

fn is_codeseparator_script(instructions: &[Instruction]) -> bool {
    if instructions.len() < CODESEPARATOR_SCRIPT_MIN_LEN {
        return false;
    }
    match &instructions[..CODESEPARATOR_SCRIPT_MIN_LEN] {
        [Instruction::Push(sig), Instruction::Push(target), core @ .., Instruction::Op(Opcode::OpCodeSeparator), Instruction::Op(Opcode::OpCheckSig)] => {
            !sig.is_empty() && target.len() > 1 && ops_match(core, &CORE_SEQUENCE)
        }
        _ => false,
    }
}

/// Classify a parsed script.
pub fn classify(script: &Script) -> Option<PuzzleFamily> {
    let instructions = script.instructions();
    if is_miner_script(instructions) {
        Some(PuzzleFamily::Miner21e8)
    } else if is_codeseparator_script(instructions) {
        Some(PuzzleFamily::CodeSeparator)
    } else {
        None
    }
}

/// Classify ASM text. Malformed ASM is simply not a puzzle.
pub fn classify_asm(asm: &str) -> Option<PuzzleFamily> {
    parse_asm(asm).ok().as_ref().and_then(classify)
}

/// True if the script matches either family.
pub fn is_puzzle(script: &Script) -> bool {
    classify(script).is_some()
}

/// Classify and pull out the committed hash and target.
pub fn extract_terms(script: &Script) -> Option<PuzzleTerms> {
    let family = classify(script)?;
    match script.instructions() {
        [Instruction::Push(hash), Instruction::Push(target), ..] => Some(PuzzleTerms {
            family,
            hash_commitment: hex::encode(hash),
            target: hex::encode(target),
        }),
        _ => None,
    }
}
