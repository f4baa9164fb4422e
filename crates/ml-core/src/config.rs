//! Factory configuration.
//!
//! Supports configuration via:
//! - Code (`FactoryConfig::new` plus `with_*` builders)
//! - JSON documents (`FactoryConfig::parse_json`, `FactoryConfig::from_file`)

use std::path::Path;

use ml_common::{Level, LogError, Result};
use serde::{Deserialize, Serialize};

/// Settings shared by every logger a factory creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Least severe level that is still logged.
    #[serde(with = "level_name")]
    pub max_level: Level,
    /// Apply masking processors. When off, masking registrations are ignored.
    pub masking_enabled: bool,
    /// Merge repeated rule registrations for the same masking processor.
    pub deduplicate: bool,
    /// Convert objects in the context, applying field mask annotations.
    pub mask_objects: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        FactoryConfig {
            max_level: Level::Debug,
            masking_enabled: true,
            deduplicate: true,
            mask_objects: true,
        }
    }
}

impl FactoryConfig {
    pub fn new(max_level: Level, masking_enabled: bool) -> Self {
        FactoryConfig {
            max_level,
            masking_enabled,
            ..FactoryConfig::default()
        }
    }

    /// Config with the level given by name; unknown names are rejected.
    pub fn with_level_name(max_level: &str, masking_enabled: bool) -> Result<Self> {
        Ok(FactoryConfig::new(max_level.parse()?, masking_enabled))
    }

    pub fn with_deduplicate(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    pub fn with_mask_objects(mut self, enabled: bool) -> Self {
        self.mask_objects = enabled;
        self
    }

    /// Load a config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LogError::runtime(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_json(&content)
    }

    /// Parse a config from a JSON string. Missing fields take their defaults.
    pub fn parse_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            if e.is_data() {
                LogError::invalid_argument(format!("invalid factory config: {}", e))
            } else {
                LogError::Json(e)
            }
        })
    }
}

/// Level names are accepted case-insensitively; unknown names are an
/// invalid argument rather than a parse error.
mod level_name {
    use ml_common::Level;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(level.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        Level::parse_str(&name).ok_or_else(|| {
            de::Error::custom(format!("the specified logging level was not found: {}", name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FactoryConfig::default();
        assert_eq!(config.max_level, Level::Debug);
        assert!(config.masking_enabled);
        assert!(config.deduplicate);
        assert!(config.mask_objects);
    }

    #[test]
    fn test_builder() {
        let config = FactoryConfig::new(Level::Error, false)
            .with_deduplicate(false)
            .with_mask_objects(false);
        assert_eq!(config.max_level, Level::Error);
        assert!(!config.masking_enabled);
        assert!(!config.deduplicate);
        assert!(!config.mask_objects);
    }

    #[test]
    fn test_level_name() {
        assert_eq!(
            FactoryConfig::with_level_name("WARNING", true).unwrap().max_level,
            Level::Warning
        );
        assert!(matches!(
            FactoryConfig::with_level_name("verbose", true),
            Err(LogError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_json_partial() {
        let config = FactoryConfig::parse_json(r#"{"max_level": "Notice", "mask_objects": false}"#)
            .unwrap();
        assert_eq!(config.max_level, Level::Notice);
        assert!(config.masking_enabled);
        assert!(!config.mask_objects);
    }

    #[test]
    fn test_parse_json_unknown_level() {
        let err = FactoryConfig::parse_json(r#"{"max_level": "trace"}"#).unwrap_err();
        assert!(err.is_programmer_error(), "{}", err);
    }

    #[test]
    fn test_parse_json_syntax_error() {
        let err = FactoryConfig::parse_json("{").unwrap_err();
        assert!(matches!(err, LogError::Json(_)));
    }

    #[test]
    fn test_serde_roundtrip_uses_level_names() {
        let config = FactoryConfig::new(Level::Critical, true);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_level"], "critical");
        let back: FactoryConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
