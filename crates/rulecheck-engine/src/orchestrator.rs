//! Evaluation orchestration: prompt → completion → classification → settle.
//!
//! Each `evaluate` call is an independent unit of work whose only suspension
//! point is the completion call. Any number can be in flight at once; each
//! settles through the workspace's single mutation entry point, in whatever
//! order the completions return.

use std::sync::Arc;

use futures::future::join_all;
use rulecheck_ai::{CompletionClient, classify};
use rulecheck_core::{RuleId, Settlement, Verdict};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::{EngineError, Workspace};

/// Result of one evaluation that passed its preconditions.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub rule_id: RuleId,
    pub verdict: Verdict,
    /// Whether the verdict was attached or discarded.
    pub settlement: Settlement,
}

pub struct Orchestrator {
    workspace: Arc<Workspace>,
    client: Arc<dyn CompletionClient>,
    credential_override: Option<SecretString>,
}

impl Orchestrator {
    pub fn new(workspace: Arc<Workspace>, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            workspace,
            client,
            credential_override: None,
        }
    }

    /// Use this credential instead of the stored one. It is never persisted.
    pub fn with_credential(mut self, credential: SecretString) -> Self {
        self.credential_override = Some(credential);
        self
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Evaluate one rule against the current subject matter.
    ///
    /// Precondition failures (no credential, blank subject matter, unknown
    /// rule) are returned as errors and change nothing. Once the rule is
    /// marked `Evaluating`, every failure is captured in the rule's own
    /// result as an `Unknown` verdict and this returns `Ok`.
    pub async fn evaluate(&self, id: RuleId) -> Result<Evaluation, EngineError> {
        let admitted = self
            .workspace
            .admit(id, self.credential_override.as_ref())
            .await?;
        info!(rule_id = %id, "evaluation started");

        let verdict = match self
            .client
            .complete(&admitted.prompt, &admitted.credential)
            .await
        {
            Ok(text) => classify(&text),
            Err(e) => {
                warn!(rule_id = %id, error = %e, "completion failed");
                Verdict::error(&e)
            }
        };

        let settlement = self.workspace.settle(admitted.ticket, verdict.clone()).await;
        Ok(Evaluation {
            rule_id: id,
            verdict,
            settlement,
        })
    }

    /// Evaluate several rules concurrently. Results are returned in input order.
    pub async fn evaluate_many(
        &self,
        ids: &[RuleId],
    ) -> Vec<(RuleId, Result<Evaluation, EngineError>)> {
        let runs = ids.iter().map(|&id| async move { (id, self.evaluate(id).await) });
        join_all(runs).await
    }

    /// Evaluate every rule in the workspace concurrently.
    pub async fn evaluate_all(&self) -> Vec<(RuleId, Result<Evaluation, EngineError>)> {
        let ids: Vec<RuleId> = self.workspace.rules().await.iter().map(|r| r.id).collect();
        self.evaluate_many(&ids).await
    }
}
