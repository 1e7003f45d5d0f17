//! Storage module for database and configuration.

pub mod config;
pub mod database;
pub mod schema;

pub use config::{load_config, load_config_from, save_config, AppConfig, ConfigError, EngineSettings};
pub use database::{ConstraintKind, Database, DatabaseError};
