//! Runtime adapters for riskwise (config/auth, AI provider, quota,
//! workspace storage, industry templates).

pub mod config;
pub mod keyring;
pub mod lookup;
pub mod openrouter;
pub mod quota;
pub mod store;
pub mod templates;

pub use config::Config;
pub use lookup::StoredEntities;
pub use openrouter::OpenRouterGateway;
pub use quota::WorkspaceQuota;
pub use store::{JsonFileStore, MemoryStore};
pub use templates::TemplateLibrary;
