use thiserror::Error;

use crate::RuleId;

/// Precondition failures. Each is rejected before any state change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("configuration missing: {0}")]
    Configuration(String),

    #[error("index {index} out of bounds for {len} rules")]
    Index { index: usize, len: usize },

    #[error("no rule with id {0}")]
    NotFound(RuleId),
}

impl RuleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
