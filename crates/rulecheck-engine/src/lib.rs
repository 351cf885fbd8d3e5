//! Evaluation engine: session workspace, rule lifecycle orchestration, and persistence wiring.

mod error;
pub mod orchestrator;
pub mod workspace;

pub use error::EngineError;
pub use orchestrator::{Evaluation, Orchestrator};
pub use workspace::Workspace;
