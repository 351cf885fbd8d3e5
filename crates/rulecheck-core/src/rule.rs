//! Rule data model: identity, lifecycle state, and evaluation verdicts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, immutable identifier assigned to a rule at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Uuid);

impl RuleId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Ternary judgement returned by the model, plus `Unknown` when no token was found
/// or the evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    NotApplicable,
    Unknown,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::NotApplicable => "not_applicable",
            Self::Unknown => "unknown",
        }
    }

    /// The lifecycle state a rule settles into when this outcome is applied.
    pub fn settled_state(&self) -> LifecycleState {
        match self {
            Self::Unknown => LifecycleState::Errored,
            _ => LifecycleState::Resolved,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::NotApplicable => "N/A",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// Where a rule is in its evaluation lifecycle.
///
/// `Idle → Evaluating → Resolved | Errored`, and any settled state can
/// re-enter `Evaluating`. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    Evaluating,
    Resolved,
    Errored,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Evaluating => "evaluating",
            Self::Resolved => "resolved",
            Self::Errored => "errored",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved | Self::Errored)
    }
}

/// A classified evaluation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    /// Full model response, or `"Error: ..."` when the evaluation failed.
    pub justification: String,
}

impl Verdict {
    pub fn new(outcome: Outcome, justification: impl Into<String>) -> Self {
        Self {
            outcome,
            justification: justification.into(),
        }
    }

    /// A captured per-rule failure: `Unknown` with the error as justification.
    pub fn error(message: impl fmt::Display) -> Self {
        Self::new(Outcome::Unknown, format!("Error: {message}"))
    }
}

/// A named evaluation rule and its current lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub title: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub state: LifecycleState,
    /// Last attached verdict. Kept while a re-evaluation is in flight so the
    /// previous answer stays visible until a new one supersedes it.
    #[serde(default)]
    pub result: Option<Verdict>,
    /// When the current `result` was attached.
    #[serde(default)]
    pub evaluated_at: Option<DateTime<Utc>>,
    /// Bumped by every `set_evaluating`; tickets carry the value they were issued with.
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl Rule {
    pub(crate) fn new(title: String, definition: String) -> Self {
        Self {
            id: RuleId::new(),
            title,
            definition,
            state: LifecycleState::Idle,
            result: None,
            evaluated_at: None,
            generation: 0,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.result.as_ref().map(|v| v.outcome)
    }

    pub fn is_evaluating(&self) -> bool {
        self.state == LifecycleState::Evaluating
    }

    pub(crate) fn attach(&mut self, verdict: Verdict) {
        self.state = verdict.outcome.settled_state();
        self.result = Some(verdict);
        self.evaluated_at = Some(Utc::now());
    }
}
