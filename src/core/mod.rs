//! Script and hashing primitives.
//!
//! Nothing in here knows about puzzles; it is the layer the classifier and
//! the solve path build on.

pub mod hash;
pub mod script;

pub use hash::{hash_bytes, solution_hex, Hash256};
pub use script::{parse_asm, Instruction, Opcode, Script, ScriptError};
