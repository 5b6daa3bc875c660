//! Allocator configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AllocatorError, AllocatorResult};

/// Capacity bounds for the allocation engine.
///
/// The two bounds default to the same value (3) but are independent knobs:
/// one caps how many streams an instance carries, the other caps how many
/// distinct instances may share a port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Maximum streams a single instance may carry (K).
    #[serde(default = "default_bound")]
    pub max_streams_per_instance: u8,
    /// Maximum distinct instances that may share one port (N).
    #[serde(default = "default_bound")]
    pub max_instances_per_port: u8,
}

fn default_bound() -> u8 {
    3
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_streams_per_instance: default_bound(),
            max_instances_per_port: default_bound(),
        }
    }
}

impl AllocatorConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(content: &str) -> AllocatorResult<Self> {
        let config: AllocatorConfig =
            toml::from_str(content).map_err(|e| AllocatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> AllocatorResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AllocatorError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Reject bounds that would make allocation impossible.
    pub fn validate(&self) -> AllocatorResult<()> {
        if self.max_streams_per_instance == 0 {
            return Err(AllocatorError::Config(
                "max_streams_per_instance must be at least 1".to_string(),
            ));
        }
        if self.max_instances_per_port == 0 {
            return Err(AllocatorError::Config(
                "max_instances_per_port must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_three_and_three() {
        let config = AllocatorConfig::default();
        assert_eq!(config.max_streams_per_instance, 3);
        assert_eq!(config.max_instances_per_port, 3);
    }

    #[test]
    fn parse_full_toml() {
        let config = AllocatorConfig::from_toml_str(
            "max_streams_per_instance = 5\nmax_instances_per_port = 2\n",
        )
        .unwrap();
        assert_eq!(config.max_streams_per_instance, 5);
        assert_eq!(config.max_instances_per_port, 2);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = AllocatorConfig::from_toml_str("max_instances_per_port = 4\n").unwrap();
        assert_eq!(config.max_streams_per_instance, 3);
        assert_eq!(config.max_instances_per_port, 4);

        let config = AllocatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, AllocatorConfig::default());
    }

    #[test]
    fn zero_bounds_are_rejected() {
        assert!(AllocatorConfig::from_toml_str("max_streams_per_instance = 0\n").is_err());
        assert!(AllocatorConfig::from_toml_str("max_instances_per_port = 0\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamgate.toml");
        std::fs::write(&path, "max_streams_per_instance = 7\n").unwrap();

        let config = AllocatorConfig::from_file(&path).unwrap();
        assert_eq!(config.max_streams_per_instance, 7);
        assert_eq!(config.max_instances_per_port, 3);
    }
}
