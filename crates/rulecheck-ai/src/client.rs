//! Completion client boundary.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::prompt::Prompt;

/// Failure of a single completion call.
///
/// The `Display` text becomes the justification of an errored rule, after an
/// `"Error: "` prefix.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status} {reason}: {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("malformed completion response: {0}")]
    Protocol(String),

    #[cfg(feature = "http")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompletionError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A language model that turns a system + user message pair into text.
///
/// One call, one attempt: retries and timeouts are the implementation's concern.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &Prompt,
        credential: &SecretString,
    ) -> Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = CompletionError::Status {
            status: 401,
            reason: "Unauthorized".into(),
            body: "invalid api key".into(),
        };
        assert_eq!(
            err.to_string(),
            "server returned 401 Unauthorized: invalid api key"
        );
        assert_eq!(err.status(), Some(401));
    }

    struct Echo;

    #[async_trait]
    impl CompletionClient for Echo {
        async fn complete(
            &self,
            prompt: &Prompt,
            _credential: &SecretString,
        ) -> Result<String, CompletionError> {
            Ok(format!("{} PASS", prompt.user))
        }
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let client: std::sync::Arc<dyn CompletionClient> = std::sync::Arc::new(Echo);
        let prompt = Prompt {
            system: "sys".into(),
            user: "Rule: Signed".into(),
        };
        let key = SecretString::new("sk-test".into());
        let text = client.complete(&prompt, &key).await.unwrap();
        assert_eq!(crate::classify(&text).outcome, rulecheck_core::Outcome::Pass);
    }

    #[test]
    fn protocol_error_has_no_status() {
        let err = CompletionError::protocol("no choices");
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "malformed completion response: no choices");
    }
}
