//! AI layer: prompt construction, verdict classification, and completion clients.

pub mod classifier;
pub mod client;
pub mod prompt;

#[cfg(feature = "http")]
pub mod openai;

pub use classifier::classify;
pub use client::{CompletionClient, CompletionError};
pub use prompt::{EvaluationRequest, Prompt};

#[cfg(feature = "http")]
pub use openai::OpenAiClient;
