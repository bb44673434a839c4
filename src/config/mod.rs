/// Database configuration and connection management
pub mod database;

/// Seed member roster from config.toml
pub mod members;

/// Environment-driven application settings
pub mod settings;

pub use settings::{AppConfig, AssistantConfig, RemoteConfig, SyncConfig};
