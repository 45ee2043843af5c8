//! Script Parsing
//!
//! Turns ASM text (space separated opcode names and hex pushes) into an
//! ordered list of tagged instructions. Only the structure of a script is
//! modelled here; nothing is executed.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// OPCODES
// =============================================================================

/// Script opcodes recognised in ASM text.
///
/// Discriminants are the on-chain byte values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Opcode {
    // Constants
    /// `OP_0`.
    Op0 = 0x00,
    /// `OP_PUSHDATA1`.
    OpPushData1 = 0x4c,
    /// `OP_PUSHDATA2`.
    OpPushData2 = 0x4d,
    /// `OP_PUSHDATA4`.
    OpPushData4 = 0x4e,
    /// `OP_1NEGATE`.
    Op1Negate = 0x4f,
    /// `OP_1`.
    Op1 = 0x51,
    /// `OP_2`.
    Op2 = 0x52,
    /// `OP_3`.
    Op3 = 0x53,
    /// `OP_4`.
    Op4 = 0x54,
    /// `OP_5`.
    Op5 = 0x55,
    /// `OP_6`.
    Op6 = 0x56,
    /// `OP_7`.
    Op7 = 0x57,
    /// `OP_8`.
    Op8 = 0x58,
    /// `OP_9`.
    Op9 = 0x59,
    /// `OP_10`.
    Op10 = 0x5a,
    /// `OP_11`.
    Op11 = 0x5b,
    /// `OP_12`.
    Op12 = 0x5c,
    /// `OP_13`.
    Op13 = 0x5d,
    /// `OP_14`.
    Op14 = 0x5e,
    /// `OP_15`.
    Op15 = 0x5f,
    /// `OP_16`.
    Op16 = 0x60,

    // Flow control
    /// `OP_NOP`.
    OpNop = 0x61,
    /// `OP_IF`.
    OpIf = 0x63,
    /// `OP_NOTIF`.
    OpNotIf = 0x64,
    /// `OP_ELSE`.
    OpElse = 0x67,
    /// `OP_ENDIF`.
    OpEndIf = 0x68,
    /// `OP_VERIFY`.
    OpVerify = 0x69,
    /// `OP_RETURN`.
    OpReturn = 0x6a,

    // Stack
    /// `OP_TOALTSTACK`.
    OpToAltStack = 0x6b,
    /// `OP_FROMALTSTACK`.
    OpFromAltStack = 0x6c,
    /// `OP_2DROP`.
    Op2Drop = 0x6d,
    /// `OP_2DUP`.
    Op2Dup = 0x6e,
    /// `OP_3DUP`.
    Op3Dup = 0x6f,
    /// `OP_2OVER`.
    Op2Over = 0x70,
    /// `OP_2ROT`.
    Op2Rot = 0x71,
    /// `OP_2SWAP`.
    Op2Swap = 0x72,
    /// `OP_IFDUP`.
    OpIfDup = 0x73,
    /// `OP_DEPTH`.
    OpDepth = 0x74,
    /// `OP_DROP`.
    OpDrop = 0x75,
    /// `OP_DUP`.
    OpDup = 0x76,
    /// `OP_NIP`.
    OpNip = 0x77,
    /// `OP_OVER`.
    OpOver = 0x78,
    /// `OP_PICK`: copies the item n back to the top.
    OpPick = 0x79,
    /// `OP_ROLL`.
    OpRoll = 0x7a,
    /// `OP_ROT`.
    OpRot = 0x7b,
    /// `OP_SWAP`.
    OpSwap = 0x7c,
    /// `OP_TUCK`.
    OpTuck = 0x7d,

    // Splice
    /// `OP_CAT`.
    OpCat = 0x7e,
    /// `OP_SPLIT`: splits an item at a position.
    OpSplit = 0x7f,
    /// `OP_NUM2BIN`.
    OpNum2Bin = 0x80,
    /// `OP_BIN2NUM`.
    OpBin2Num = 0x81,
    /// `OP_SIZE`: pushes the byte length of the top item.
    OpSize = 0x82,

    // Bitwise logic
    /// `OP_INVERT`.
    OpInvert = 0x83,
    /// `OP_AND`.
    OpAnd = 0x84,
    /// `OP_OR`.
    OpOr = 0x85,
    /// `OP_XOR`.
    OpXor = 0x86,
    /// `OP_EQUAL`.
    OpEqual = 0x87,
    /// `OP_EQUALVERIFY`: fails unless the top two items are equal.
    OpEqualVerify = 0x88,

    // Arithmetic
    /// `OP_1ADD`.
    Op1Add = 0x8b,
    /// `OP_1SUB`.
    Op1Sub = 0x8c,
    /// `OP_NEGATE`.
    OpNegate = 0x8f,
    /// `OP_ABS`.
    OpAbs = 0x90,
    /// `OP_NOT`.
    OpNot = 0x91,
    /// `OP_0NOTEQUAL`.
    Op0NotEqual = 0x92,
    /// `OP_ADD`.
    OpAdd = 0x93,
    /// `OP_SUB`.
    OpSub = 0x94,
    /// `OP_MUL`.
    OpMul = 0x95,
    /// `OP_DIV`.
    OpDiv = 0x96,
    /// `OP_MOD`.
    OpMod = 0x97,
    /// `OP_LSHIFT`.
    OpLShift = 0x98,
    /// `OP_RSHIFT`.
    OpRShift = 0x99,
    /// `OP_BOOLAND`.
    OpBoolAnd = 0x9a,
    /// `OP_BOOLOR`.
    OpBoolOr = 0x9b,
    /// `OP_NUMEQUAL`.
    OpNumEqual = 0x9c,
    /// `OP_NUMEQUALVERIFY`.
    OpNumEqualVerify = 0x9d,
    /// `OP_NUMNOTEQUAL`.
    OpNumNotEqual = 0x9e,
    /// `OP_LESSTHAN`.
    OpLessThan = 0x9f,
    /// `OP_GREATERTHAN`.
    OpGreaterThan = 0xa0,
    /// `OP_LESSTHANOREQUAL`.
    OpLessThanOrEqual = 0xa1,
    /// `OP_GREATERTHANOREQUAL`.
    OpGreaterThanOrEqual = 0xa2,
    /// `OP_MIN`.
    OpMin = 0xa3,
    /// `OP_MAX`.
    OpMax = 0xa4,
    /// `OP_WITHIN`.
    OpWithin = 0xa5,

    // Crypto
    /// `OP_RIPEMD160`.
    OpRipemd160 = 0xa6,
    /// `OP_SHA1`.
    OpSha1 = 0xa7,
    /// `OP_SHA256`: hashes the top item with SHA-256.
    OpSha256 = 0xa8,
    /// `OP_HASH160`.
    OpHash160 = 0xa9,
    /// `OP_HASH256`.
    OpHash256 = 0xaa,
    /// `OP_CODESEPARATOR`: marks the start of signature-checked code.
    OpCodeSeparator = 0xab,
    /// `OP_CHECKSIG`: verifies a signature against a public key.
    OpCheckSig = 0xac,
    /// `OP_CHECKSIGVERIFY`.
    OpCheckSigVerify = 0xad,
    /// `OP_CHECKMULTISIG`.
    OpCheckMultiSig = 0xae,
    /// `OP_CHECKMULTISIGVERIFY`.
    OpCheckMultiSigVerify = 0xaf,

    // Locktime
    /// `OP_CHECKLOCKTIMEVERIFY`.
    OpCheckLockTimeVerify = 0xb1,
    /// `OP_CHECKSEQUENCEVERIFY`.
    OpCheckSequenceVerify = 0xb2,
}

/// ASM names, including the aliases some encoders emit.
const OPCODE_NAMES: &[(&str, Opcode)] = &[
    ("OP_0", Opcode::Op0),
    ("OP_FALSE", Opcode::Op0),
    ("OP_PUSHDATA1", Opcode::OpPushData1),
    ("OP_PUSHDATA2", Opcode::OpPushData2),
    ("OP_PUSHDATA4", Opcode::OpPushData4),
    ("OP_1NEGATE", Opcode::Op1Negate),
    ("OP_1", Opcode::Op1),
    ("OP_TRUE", Opcode::Op1),
    ("OP_2", Opcode::Op2),
    ("OP_3", Opcode::Op3),
    ("OP_4", Opcode::Op4),
    ("OP_5", Opcode::Op5),
    ("OP_6", Opcode::Op6),
    ("OP_7", Opcode::Op7),
    ("OP_8", Opcode::Op8),
    ("OP_9", Opcode::Op9),
    ("OP_10", Opcode::Op10),
    ("OP_11", Opcode::Op11),
    ("OP_12", Opcode::Op12),
    ("OP_13", Opcode::Op13),
    ("OP_14", Opcode::Op14),
    ("OP_15", Opcode::Op15),
    ("OP_16", Opcode::Op16),
    ("OP_NOP", Opcode::OpNop),
    ("OP_IF", Opcode::OpIf),
    ("OP_NOTIF", Opcode::OpNotIf),
    ("OP_ELSE", Opcode::OpElse),
    ("OP_ENDIF", Opcode::OpEndIf),
    ("OP_VERIFY", Opcode::OpVerify),
    ("OP_RETURN", Opcode::OpReturn),
    ("OP_TOALTSTACK", Opcode::OpToAltStack),
    ("OP_FROMALTSTACK", Opcode::OpFromAltStack),
    ("OP_2DROP", Opcode::Op2Drop),
    ("OP_2DUP", Opcode::Op2Dup),
    ("OP_3DUP", Opcode::Op3Dup),
    ("OP_2OVER", Opcode::Op2Over),
    ("OP_2ROT", Opcode::Op2Rot),
    ("OP_2SWAP", Opcode::Op2Swap),
    ("OP_IFDUP", Opcode::OpIfDup),
    ("OP_DEPTH", Opcode::OpDepth),
    ("OP_DROP", Opcode::OpDrop),
    ("OP_DUP", Opcode::OpDup),
    ("OP_NIP", Opcode::OpNip),
    ("OP_OVER", Opcode::OpOver),
    ("OP_PICK", Opcode::OpPick),
    ("OP_ROLL", Opcode::OpRoll),
    ("OP_ROT", Opcode::OpRot),
    ("OP_SWAP", Opcode::OpSwap),
    ("OP_TUCK", Opcode::OpTuck),
    ("OP_CAT", Opcode::OpCat),
    ("OP_SPLIT", Opcode::OpSplit),
    ("OP_NUM2BIN", Opcode::OpNum2Bin),
    ("OP_BIN2NUM", Opcode::OpBin2Num),
    ("OP_SIZE", Opcode::OpSize),
    ("OP_INVERT", Opcode::OpInvert),
    ("OP_AND", Opcode::OpAnd),
    ("OP_OR", Opcode::OpOr),
    ("OP_XOR", Opcode::OpXor),
    ("OP_EQUAL", Opcode::OpEqual),
    ("OP_EQUALVERIFY", Opcode::OpEqualVerify),
    ("OP_1ADD", Opcode::Op1Add),
    ("OP_1SUB", Opcode::Op1Sub),
    ("OP_NEGATE", Opcode::OpNegate),
    ("OP_ABS", Opcode::OpAbs),
    ("OP_NOT", Opcode::OpNot),
    ("OP_0NOTEQUAL", Opcode::Op0NotEqual),
    ("OP_ADD", Opcode::OpAdd),
    ("OP_SUB", Opcode::OpSub),
    ("OP_MUL", Opcode::OpMul),
    ("OP_DIV", Opcode::OpDiv),
    ("OP_MOD", Opcode::OpMod),
    ("OP_LSHIFT", Opcode::OpLShift),
    ("OP_RSHIFT", Opcode::OpRShift),
    ("OP_BOOLAND", Opcode::OpBoolAnd),
    ("OP_BOOLOR", Opcode::OpBoolOr),
    ("OP_NUMEQUAL", Opcode::OpNumEqual),
    ("OP_NUMEQUALVERIFY", Opcode::OpNumEqualVerify),
    ("OP_NUMNOTEQUAL", Opcode::OpNumNotEqual),
    ("OP_LESSTHAN", Opcode::OpLessThan),
    ("OP_GREATERTHAN", Opcode::OpGreaterThan),
    ("OP_LESSTHANOREQUAL", Opcode::OpLessThanOrEqual),
    ("OP_GREATERTHANOREQUAL", Opcode::OpGreaterThanOrEqual),
    ("OP_MIN", Opcode::OpMin),
    ("OP_MAX", Opcode::OpMax),
    ("OP_WITHIN", Opcode::OpWithin),
    ("OP_RIPEMD160", Opcode::OpRipemd160),
    ("OP_SHA1", Opcode::OpSha1),
    ("OP_SHA256", Opcode::OpSha256),
    ("OP_HASH160", Opcode::OpHash160),
    ("OP_HASH256", Opcode::OpHash256),
    ("OP_CODESEPARATOR", Opcode::OpCodeSeparator),
    ("OP_CHECKSIG", Opcode::OpCheckSig),
    ("OP_CHECKSIGVERIFY", Opcode::OpCheckSigVerify),
    ("OP_CHECKMULTISIG", Opcode::OpCheckMultiSig),
    ("OP_CHECKMULTISIGVERIFY", Opcode::OpCheckMultiSigVerify),
    ("OP_CHECKLOCKTIMEVERIFY", Opcode::OpCheckLockTimeVerify),
    ("OP_NOP2", Opcode::OpCheckLockTimeVerify),
    ("OP_CHECKSEQUENCEVERIFY", Opcode::OpCheckSequenceVerify),
    ("OP_NOP3", Opcode::OpCheckSequenceVerify),
];

impl Opcode {
    /// Look up an opcode by its ASM name.
    pub fn from_name(name: &str) -> Option<Opcode> {
        OPCODE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, op)| *op)
    }

    /// Canonical ASM name (first entry in the name table).
    pub fn name(self) -> &'static str {
        OPCODE_NAMES
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(n, _)| *n)
            .unwrap_or("OP_UNKNOWN")
    }

    /// On-chain byte value.
    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// INSTRUCTIONS
// =============================================================================

/// A single parsed script element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Literal data push.
    Push(Vec<u8>),
    /// Non-push opcode.
    Op(Opcode),
}

impl Instruction {
    /// Pushed bytes, if this is a literal push.
    pub fn as_push(&self) -> Option<&[u8]> {
        match self {
            Instruction::Push(data) => Some(data),
            Instruction::Op(_) => None,
        }
    }
}

/// Script parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// Token starts with `OP_` but is not a known opcode.
    #[error("unknown opcode {0}")]
    UnknownOpcode(String),
    /// Token is neither an opcode nor valid hex.
    #[error("invalid push data {token:?} at position {position}")]
    InvalidPush {
        /// Offending token.
        token: String,
        /// Instruction index.
        position: usize,
    },
}

/// Parsed script: an ordered instruction list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Script {
    instructions: Vec<Instruction>,
}

impl Script {
    /// Build from instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Instructions in order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if the script has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Data of the first instruction, if it is a literal push.
    pub fn first_push(&self) -> Option<&[u8]> {
        self.instructions.first().and_then(Instruction::as_push)
    }

    /// Render back to ASM.
    pub fn to_asm(&self) -> String {
        self.instructions
            .iter()
            .map(|ins| match ins {
                Instruction::Push(data) => hex::encode(data),
                Instruction::Op(op) => op.name().to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromStr for Script {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_asm(s)
    }
}

/// Parse ASM text into a [`Script`].
///
/// `0` and `-1` are the minimal encodings of `OP_0` and `OP_1NEGATE`.
pub fn parse_asm(asm: &str) -> Result<Script, ScriptError> {
    let mut instructions = Vec::new();

    for (position, token) in asm.split_whitespace().enumerate() {
        let instruction = match token {
            "0" => Instruction::Op(Opcode::Op0),
            "-1" => Instruction::Op(Opcode::Op1Negate),
            t if t.starts_with("OP_") => Instruction::Op(
                Opcode::from_name(t).ok_or_else(|| ScriptError::UnknownOpcode(t.to_string()))?,
            ),
            t => {
                let data = hex::decode(t).map_err(|_| ScriptError::InvalidPush {
                    token: t.to_string(),
                    position,
                })?;
                Instruction::Push(data)
            }
        };
        instructions.push(instruction);
    }

    Ok(Script::new(instructions))
}

// =============================================================================
// TESTS
// =============================================================================
