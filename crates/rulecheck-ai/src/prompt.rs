//! Prompt construction for a single rule evaluation.
//!
//! The user message carries the rule, the subject matter, and a fixed
//! instruction asking the model to finish with one verdict token. See
//! [`crate::classifier`] for how that token is read back.

use rulecheck_core::{Rule, RuleError};

/// Appended to every user message.
pub const VERDICT_INSTRUCTION: &str = "\
Explain your reasoning briefly. End your answer with exactly one of these tokens: \
PASS if the subject matter complies with the rule, FAIL if it does not, \
or NA if the rule does not apply.";

/// System and user messages for one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Everything needed to evaluate one rule, captured at request time.
///
/// Later edits to the rule or the configuration do not affect a request that
/// has already been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRequest {
    pub rule_title: String,
    pub rule_definition: String,
    pub subject_matter: String,
    pub system_prompt: String,
}

impl EvaluationRequest {
    pub fn new(rule: &Rule, subject_matter: &str, system_prompt: &str) -> Self {
        Self {
            rule_title: rule.title.clone(),
            rule_definition: rule.definition.clone(),
            subject_matter: subject_matter.to_string(),
            system_prompt: system_prompt.to_string(),
        }
    }

    /// Validate and render the request.
    ///
    /// Blank subject matter or an empty system prompt is rejected, so callers
    /// can check before spending a network round trip.
    pub fn build(&self) -> Result<Prompt, RuleError> {
        if self.subject_matter.trim().is_empty() {
            return Err(RuleError::validation("subject matter must not be empty"));
        }
        if self.system_prompt.trim().is_empty() {
            return Err(RuleError::validation("system prompt must not be empty"));
        }

        let definition = match self.rule_definition.trim() {
            "" => "(no definition provided)",
            d => d,
        };

        let user = format!(
            "Rule: {title}\n\
             Definition: {definition}\n\
             \n\
             Subject matter:\n\
             {subject}\n\
             \n\
             {instruction}",
            title = self.rule_title,
            subject = self.subject_matter.trim(),
            instruction = VERDICT_INSTRUCTION,
        );

        Ok(Prompt {
            system: self.system_prompt.clone(),
            user,
        })
    }
}

/// Compose the prompt for evaluating `rule` against `subject_matter`.
pub fn build(rule: &Rule, subject_matter: &str, system_prompt: &str) -> Result<Prompt, RuleError> {
    EvaluationRequest::new(rule, subject_matter, system_prompt).build()
}
