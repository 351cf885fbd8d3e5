//! Verdict classification for free-text model responses.
//!
//! Scans the raw response for the verdict tokens requested by
//! [`crate::prompt::VERDICT_INSTRUCTION`]. Tokens are checked in a fixed
//! priority order, `PASS` then `FAIL` then `NA`, as case-sensitive substrings.
//! The first token in that order that appears anywhere in the text wins; its
//! position in the text is irrelevant. No token means `Unknown`.
//!
//! The whole response is kept as the justification.

use rulecheck_core::{Outcome, Verdict};

/// Verdict tokens in priority order.
pub const VERDICT_TOKENS: [(&str, Outcome); 3] = [
    ("PASS", Outcome::Pass),
    ("FAIL", Outcome::Fail),
    ("NA", Outcome::NotApplicable),
];

/// Outcome named by the highest-priority token present in `raw`.
pub fn outcome_of(raw: &str) -> Outcome {
    VERDICT_TOKENS
        .iter()
        .find(|(token, _)| raw.contains(token))
        .map(|&(_, outcome)| outcome)
        .unwrap_or(Outcome::Unknown)
}

/// Classify a raw model response. Pure and total.
pub fn classify(raw: &str) -> Verdict {
    Verdict::new(outcome_of(raw), raw)
}
