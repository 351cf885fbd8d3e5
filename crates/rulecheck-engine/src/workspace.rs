//! Session state: rule collection, subject matter, and settings, persisted through a gateway.
//!
//! One `Workspace` is constructed per session and shared by reference. All
//! rule mutations go through a single async mutex; the persisted snapshot is
//! written while that lock is held, so snapshots reach storage in the same
//! order as the mutations that produced them.
//!
//! Several workspaces (separate CLI processes, say) may share one storage.
//! Every read-modify-write of the rule collection takes the gateway's lock
//! and first merges in whatever the other sessions stored, so one session's
//! write never drops another's edits or verdicts.
//!
//! User edits (add, remove, reorder, settings) are persisted before they are
//! committed in memory: a failed write leaves the session unchanged.
//! Evaluation results are committed first and persisted best-effort.

use std::sync::Arc;

use rulecheck_ai::{EvaluationRequest, Prompt};
use rulecheck_core::{EvaluationTicket, Rule, RuleError, RuleId, RuleStore, Settlement, Verdict};
use rulecheck_store::{PersistenceGateway, Settings, keys};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::EngineError;

pub struct Workspace {
    gateway: Arc<dyn PersistenceGateway>,
    rules: Mutex<RuleStore>,
    settings: RwLock<Settings>,
    subject: RwLock<String>,
}

/// Everything an evaluation needs once it has been admitted.
pub(crate) struct Admitted {
    pub ticket: EvaluationTicket,
    pub prompt: Prompt,
    pub credential: SecretString,
}

impl Workspace {
    /// Load a workspace from the gateway. Absent keys start empty or default.
    pub fn load(gateway: Arc<dyn PersistenceGateway>) -> Result<Self, EngineError> {
        let mut store = RuleStore::new();
        if let Some(json) = gateway.get(keys::RULES)? {
            let rules: Vec<Rule> = serde_json::from_str(&json)?;
            store.restore(rules);
        }
        let settings = Settings::load(gateway.as_ref())?;
        let subject = gateway.get(keys::SUBJECT_MATTER)?.unwrap_or_default();

        info!(
            rules = store.len(),
            has_credential = settings.has_credential(),
            "workspace loaded"
        );
        Ok(Self {
            gateway,
            rules: Mutex::new(store),
            settings: RwLock::new(settings),
            subject: RwLock::new(subject),
        })
    }

    // ── Rules ──

    /// Snapshot of all rules in order.
    pub async fn rules(&self) -> Vec<Rule> {
        self.rules.lock().await.snapshot()
    }

    pub async fn rule(&self, id: RuleId) -> Option<Rule> {
        self.rules.lock().await.get(id).cloned()
    }

    pub async fn add_rule(&self, title: &str, definition: &str) -> Result<RuleId, EngineError> {
        let mut rules = self.rules.lock().await;
        let _lock = self.gateway.lock()?;
        self.refresh(&mut rules)?;
        let mut next = rules.clone();
        let id = next.add(title, definition)?;
        self.persist_rules(&next)?;
        *rules = next;
        info!(rule_id = %id, "rule added");
        Ok(id)
    }

    /// Remove a rule. Returns `false` (and writes nothing) if it was absent.
    pub async fn remove_rule(&self, id: RuleId) -> Result<bool, EngineError> {
        let mut rules = self.rules.lock().await;
        let _lock = self.gateway.lock()?;
        self.refresh(&mut rules)?;
        let mut next = rules.clone();
        if !next.remove(id) {
            return Ok(false);
        }
        self.persist_rules(&next)?;
        *rules = next;
        info!(rule_id = %id, "rule removed");
        Ok(true)
    }

    /// Positions refer to the stored order, which may include other sessions' edits.
    pub async fn reorder_rules(&self, from: usize, to: usize) -> Result<(), EngineError> {
        let mut rules = self.rules.lock().await;
        let _lock = self.gateway.lock()?;
        self.refresh(&mut rules)?;
        let mut next = rules.clone();
        next.reorder(from, to)?;
        if from != to {
            self.persist_rules(&next)?;
        }
        *rules = next;
        Ok(())
    }

    // ── Subject matter ──

    pub async fn subject(&self) -> String {
        self.subject.read().await.clone()
    }

    pub async fn set_subject(&self, text: &str) -> Result<(), EngineError> {
        let mut subject = self.subject.write().await;
        self.gateway.set(keys::SUBJECT_MATTER, text)?;
        *subject = text.to_string();
        debug!(chars = text.len(), "subject matter updated");
        Ok(())
    }

    // ── Settings ──

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn set_system_prompt(&self, prompt: &str) -> Result<(), EngineError> {
        if prompt.trim().is_empty() {
            return Err(RuleError::validation("system prompt must not be empty").into());
        }
        self.update_settings(|s| s.system_prompt = prompt.to_string())
            .await
    }

    /// Restore the built-in default system prompt.
    pub async fn reset_system_prompt(&self) -> Result<(), EngineError> {
        self.update_settings(|s| s.system_prompt = Settings::default().system_prompt)
            .await
    }

    pub async fn set_credential(&self, credential: &str) -> Result<(), EngineError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(RuleError::validation("credential must not be empty").into());
        }
        let secret = SecretString::new(credential.to_string());
        self.update_settings(|s| s.credential = Some(secret)).await
    }

    pub async fn clear_credential(&self) -> Result<(), EngineError> {
        self.update_settings(|s| s.credential = None).await
    }

    async fn update_settings(&self, edit: impl FnOnce(&mut Settings)) -> Result<(), EngineError> {
        let mut settings = self.settings.write().await;
        let _lock = self.gateway.lock()?;
        let mut next = Settings::load(self.gateway.as_ref())?;
        edit(&mut next);
        next.save(self.gateway.as_ref())?;
        *settings = next;
        info!(
            default_prompt = settings.uses_default_prompt(),
            has_credential = settings.has_credential(),
            "settings saved"
        );
        Ok(())
    }

    // ── Evaluation lifecycle ──

    /// Check preconditions, build the prompt, and mark the rule `Evaluating`.
    ///
    /// Nothing changes unless every precondition holds. The prompt and
    /// credential are captured here, so later configuration edits do not
    /// affect this evaluation.
    pub(crate) async fn admit(
        &self,
        id: RuleId,
        credential_override: Option<&SecretString>,
    ) -> Result<Admitted, EngineError> {
        let settings = self.settings.read().await;
        let credential = credential_override
            .or(settings.credential.as_ref())
            .filter(|c| !c.expose_secret().trim().is_empty())
            .cloned()
            .ok_or_else(|| RuleError::configuration("no API credential configured"))?;

        let subject = self.subject.read().await;
        if subject.trim().is_empty() {
            return Err(RuleError::validation("subject matter must not be empty").into());
        }

        let mut rules = self.rules.lock().await;
        let _lock = self.gateway.lock()?;
        self.refresh(&mut rules)?;
        let rule = rules.get(id).ok_or(RuleError::NotFound(id))?;
        let prompt = EvaluationRequest::new(rule, &subject, &settings.system_prompt).build()?;
        let ticket = rules.set_evaluating(id)?;

        Ok(Admitted {
            ticket,
            prompt,
            credential,
        })
    }

    /// Settle an evaluation and persist the resulting snapshot.
    ///
    /// The stored collection is merged in first, so a rule removed by another
    /// session settles as `Removed` and nothing is written. A storage failure
    /// is logged; the verdict stays applied in memory and is not written over
    /// a collection this session could not read.
    pub(crate) async fn settle(&self, ticket: EvaluationTicket, verdict: Verdict) -> Settlement {
        let mut rules = self.rules.lock().await;
        let synced = self
            .gateway
            .lock()
            .map_err(EngineError::from)
            .and_then(|lock| self.refresh(&mut rules).map(|()| lock));
        let lock = match synced {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(rule_id = %ticket.rule_id, error = %e, "could not read stored rules");
                None
            }
        };

        let outcome = verdict.outcome;
        let settlement = rules.settle(ticket, verdict);
        match settlement {
            Settlement::Applied => {
                info!(rule_id = %ticket.rule_id, outcome = ?outcome, "verdict applied");
                if lock.is_some() {
                    if let Err(e) = self.persist_rules(&rules) {
                        warn!(rule_id = %ticket.rule_id, error = %e, "failed to persist rules");
                    }
                }
            }
            Settlement::Superseded => {
                debug!(rule_id = %ticket.rule_id, "verdict discarded: newer evaluation pending");
            }
            Settlement::Removed => {
                debug!(rule_id = %ticket.rule_id, "verdict discarded: rule was removed");
            }
        }
        settlement
    }

    /// Merge the stored collection into `store`. Callers hold the gateway lock.
    fn refresh(&self, store: &mut RuleStore) -> Result<(), EngineError> {
        if let Some(json) = self.gateway.get(keys::RULES)? {
            let stored: Vec<Rule> = serde_json::from_str(&json)?;
            store.merge(stored);
        }
        Ok(())
    }

    fn persist_rules(&self, store: &RuleStore) -> Result<(), EngineError> {
        let json = serde_json::to_string(&store.snapshot())?;
        self.gateway.set(keys::RULES, &json)?;
        Ok(())
    }
}
