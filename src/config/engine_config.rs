use crate::geometry::{EdgeRules, DEFAULT_MIN_DIMENSION_PX, DEFAULT_TOLERANCE_PX};
use crate::services::graph_invariant::DistanceRule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

const ENGINE_FILE_NAME: &str = "engine.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Host-supplied constants for the group move engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Inclusive distance within which two edges count as shared
    pub tolerance_px: i32,
    /// Smallest width/height a follower is squeezed to
    pub min_dimension_px: i32,
    /// Interval of the coalescing tick during a gesture
    pub tick_interval_ms: u64,
    /// Distance rule for size and combined changes
    pub resize_distance_rule: DistanceRule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance_px: DEFAULT_TOLERANCE_PX,
            min_dimension_px: DEFAULT_MIN_DIMENSION_PX,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            resize_distance_rule: DistanceRule::Exact,
        }
    }
}

impl EngineConfig {
    /// `~/.config/dockgroup/engine.toml`
    pub fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir
            .join(".config")
            .join("dockgroup")
            .join(ENGINE_FILE_NAME)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;

        // Atomic write
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(temp_path, path)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance_px < 0 {
            return Err(invalid("tolerance_px", "must not be negative"));
        }
        if self.min_dimension_px <= 0 {
            return Err(invalid("min_dimension_px", "must be positive"));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be positive"));
        }
        Ok(())
    }

    /// Apply `DOCKGROUP_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, validating the result
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DOCKGROUP_TOLERANCE_PX") {
            self.tolerance_px = parse_override("DOCKGROUP_TOLERANCE_PX", &value)?;
        }
        if let Some(value) = lookup("DOCKGROUP_MIN_DIMENSION_PX") {
            self.min_dimension_px = parse_override("DOCKGROUP_MIN_DIMENSION_PX", &value)?;
        }
        if let Some(value) = lookup("DOCKGROUP_TICK_INTERVAL_MS") {
            self.tick_interval_ms = parse_override("DOCKGROUP_TICK_INTERVAL_MS", &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn edge_rules(&self) -> EdgeRules {
        EdgeRules {
            tolerance: self.tolerance_px,
            min_dimension: self.min_dimension_px,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, &format!("'{}' is not a number", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: EngineConfig = toml::from_str("tolerance_px = 3").unwrap();
        assert_eq!(config.tolerance_px, 3);
        assert_eq!(config.min_dimension_px, DEFAULT_MIN_DIMENSION_PX);
        assert_eq!(config.resize_distance_rule, DistanceRule::Exact);
    }

    #[test]
    fn overrides_are_parsed_and_validated() {
        let env: HashMap<&str, &str> = [
            ("DOCKGROUP_TOLERANCE_PX", "2"),
            ("DOCKGROUP_TICK_INTERVAL_MS", " 33 "),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::default()
            .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.tolerance_px, 2);
        assert_eq!(config.tick_interval(), Duration::from_millis(33));

        let broken = EngineConfig::default()
            .apply_overrides(|key| (key == "DOCKGROUP_MIN_DIMENSION_PX").then(|| "0".to_string()));
        assert!(matches!(broken, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn rejects_non_numeric_override() {
        let result = EngineConfig::default()
            .apply_overrides(|key| (key == "DOCKGROUP_TOLERANCE_PX").then(|| "wide".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key, .. }) if key == "DOCKGROUP_TOLERANCE_PX"
        ));
    }
}
