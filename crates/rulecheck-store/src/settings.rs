//! Persisted configuration: system prompt and completion credential.

use secrecy::{ExposeSecret, SecretString};

use crate::{PersistenceGateway, StoreError, keys};

/// System prompt used when none has been saved.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a careful compliance reviewer. You are given one rule and a block of subject matter.

Decide whether the subject matter complies with the rule, fails it, or whether the rule \
does not apply to it. Base your judgement only on the subject matter provided; do not \
assume facts that are not stated.

Explain your reasoning in a few sentences, then finish with exactly one verdict token.";

/// Configuration that persists independently of the rule collection.
#[derive(Debug, Clone)]
pub struct Settings {
    pub system_prompt: String,
    pub credential: Option<SecretString>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            credential: None,
        }
    }
}

impl Settings {
    /// Read settings from the gateway, falling back to defaults for absent or blank values.
    pub fn load(gateway: &dyn PersistenceGateway) -> Result<Self, StoreError> {
        let system_prompt = gateway
            .get(keys::SYSTEM_PROMPT)?
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let credential = gateway
            .get(keys::CREDENTIAL)?
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .map(SecretString::new);

        Ok(Self {
            system_prompt,
            credential,
        })
    }

    /// Write every field back. An absent credential removes the stored one.
    pub fn save(&self, gateway: &dyn PersistenceGateway) -> Result<(), StoreError> {
        gateway.set(keys::SYSTEM_PROMPT, &self.system_prompt)?;
        match &self.credential {
            Some(secret) => gateway.set(keys::CREDENTIAL, secret.expose_secret())?,
            None => gateway.remove(keys::CREDENTIAL)?,
        }
        Ok(())
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn uses_default_prompt(&self) -> bool {
        self.system_prompt == DEFAULT_SYSTEM_PROMPT
    }
}
