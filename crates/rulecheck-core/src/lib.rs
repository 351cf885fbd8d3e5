//! Core types for rulecheck: rules, their evaluation lifecycle, and the ordered rule store.

mod error;
pub mod rule;
pub mod store;

pub use error::RuleError;
pub use rule::{LifecycleState, Outcome, Rule, RuleId, Verdict};
pub use store::{EvaluationTicket, RuleStore, Settlement};
