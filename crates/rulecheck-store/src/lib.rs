//! Storage layer: key-value persistence gateways (file-backed and in-memory) and persisted settings.

mod error;
pub use error::StoreError;

pub mod file;
pub mod gateway;
pub mod settings;

pub use file::FileGateway;
pub use gateway::{GatewayLock, MemoryGateway, PersistenceGateway, keys};
pub use settings::{DEFAULT_SYSTEM_PROMPT, Settings};
