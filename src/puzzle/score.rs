//! Proof-of-Work Scoring
//!
//! A solution's depth is the number of leading characters its hash shares
//! with the puzzle target. The score is `10^depth`, negated when the target
//! spells a symbol classified as undesirable.

use serde::{Deserialize, Serialize};

/// Longest hex string that can name a Unicode scalar.
const MAX_SYMBOL_DIGITS: usize = 6;

/// Classification of the symbol a target may encode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolClass {
    /// Not a recognised symbol.
    #[default]
    None,
    /// Recognised and penalised.
    Undesirable,
    /// Recognised and kept.
    Notable,
}

impl SymbolClass {
    /// True for `Undesirable` and `Notable`.
    pub fn is_recognised(self) -> bool {
        !matches!(self, SymbolClass::None)
    }
}

/// Count of equal leading characters, compared up to the shorter string.
pub fn match_depth(solution: &str, target: &str) -> u32 {
    solution
        .chars()
        .zip(target.chars())
        .take_while(|(a, b)| a == b)
        .count() as u32
}

/// Score for a depth under the given symbol class.
pub fn score(depth: u32, class: SymbolClass) -> f64 {
    let power = 10f64.powi(depth as i32);
    match class {
        SymbolClass::Undesirable => -power,
        _ => power,
    }
}

/// Depth and score in one step.
pub fn score_solution(solution: &str, target: &str, class: SymbolClass) -> (u32, f64) {
    let depth = match_depth(solution, target);
    (depth, score(depth, class))
}

/// Interpret a target as a hex code point and render it.
pub fn decode_symbol(target: &str) -> Option<String> {
    if target.is_empty()
        || target.len() > MAX_SYMBOL_DIGITS
        || !target.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    let code = u32::from_str_radix(target, 16).ok()?;
    char::from_u32(code).map(String::from)
}
