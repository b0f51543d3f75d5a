//! Configuration management for dockgroup

pub mod engine_config;
pub mod validator;

pub use engine_config::{ConfigError, EngineConfig, DEFAULT_TICK_INTERVAL_MS};
pub use validator::{ScenarioValidator, ValidationResult, ValidationRule, ValidationSeverity};
