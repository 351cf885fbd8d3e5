use rulecheck_core::RuleError;
use rulecheck_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("stored rule collection is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl EngineError {
    /// The precondition failure behind this error, if any.
    pub fn as_rule_error(&self) -> Option<&RuleError> {
        match self {
            Self::Rule(e) => Some(e),
            _ => None,
        }
    }
}
