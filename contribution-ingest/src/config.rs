//! Configuration for the ingestion engine.

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use contribution_schema::{ExtendedCatalog, TypeRegistry, ValidationOptions};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::fingerprint::FINGERPRINT_DOMAIN;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Which contribution types are known
    pub registry: RegistryConfig,
    /// Validation tolerances
    pub validation: ValidationConfig,
    /// Batch execution
    pub pipeline: PipelineConfig,
    /// Fingerprint parameters
    pub fingerprint: FingerprintConfig,
}

impl IngestConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Read, parse and validate a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: "pipeline.max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.validation.max_future_skew_secs < 0 {
            return Err(ConfigError::Invalid {
                field: "validation.max_future_skew_secs",
                reason: format!("{} is negative", self.validation.max_future_skew_secs),
            });
        }
        if self.validation.max_payload_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "validation.max_payload_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fingerprint.domain.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "fingerprint.domain",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Build a registry holding the configured catalogs.
    pub fn build_registry(&self) -> Arc<TypeRegistry> {
        let registry = TypeRegistry::with_builtins();
        if self.registry.extended_catalog {
            registry.install(&ExtendedCatalog);
        }
        for tag in &self.registry.disabled_types {
            if registry.unregister(tag).is_none() {
                warn!(contribution_type = %tag, "Disabled type was never registered");
            }
        }
        info!(types = ?registry.tags(), "Type registry ready");
        Arc::new(registry)
    }

    /// Validator tolerances derived from this config.
    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            max_future_skew: Duration::seconds(self.validation.max_future_skew_secs),
            max_opaque_depth: self.validation.max_payload_depth,
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Also install the extended provider catalog
    pub extended_catalog: bool,
    /// Tags removed after catalogs are installed
    pub disabled_types: Vec<String>,
}

/// Validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Clock skew tolerated before a claimed date counts as future (seconds)
    pub max_future_skew_secs: i64,
    /// Deepest nesting accepted in pass-through values
    pub max_payload_depth: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_future_skew_secs: 300, // 5 minutes
            max_payload_depth: 32,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records of one batch processed at the same time
    pub max_concurrent: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_concurrent: 16 }
    }
}

/// Fingerprint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Domain separation tag
    pub domain: String,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            domain: FINGERPRINT_DOMAIN.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contribution_schema::tags;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert!(!config.registry.extended_catalog);
        assert_eq!(config.validation.max_future_skew_secs, 300);
        assert_eq!(config.pipeline.max_concurrent, 16);
        assert_eq!(config.fingerprint.domain, "CONTRIB:FP:V1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = IngestConfig::default();
        config.registry.extended_catalog = true;
        config.registry.disabled_types = vec![tags::TWITTER.to_string()];

        let yaml = config.to_yaml().unwrap();
        let parsed = IngestConfig::from_yaml(&yaml).unwrap();
        assert!(parsed.registry.extended_catalog);
        assert_eq!(parsed.registry.disabled_types, vec!["TWITTER"]);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed = IngestConfig::from_yaml("pipeline:\n  max_concurrent: 4\n").unwrap();
        assert_eq!(parsed.pipeline.max_concurrent, 4);
        assert_eq!(parsed.validation.max_payload_depth, 32);
    }

    #[test]
    fn test_invalid_values() {
        let mut config = IngestConfig::default();
        config.pipeline.max_concurrent = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "pipeline.max_concurrent", .. })
        ));

        let mut config = IngestConfig::default();
        config.fingerprint.domain = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.validation.max_future_skew_secs = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = IngestConfig::from_file("/nonexistent/ingest.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_build_registry() {
        let default = IngestConfig::default().build_registry();
        assert_eq!(default.len(), 4);
        assert!(!default.contains(tags::NETFLIX));

        let mut config = IngestConfig::default();
        config.registry.extended_catalog = true;
        config.registry.disabled_types = vec![tags::STEAM.to_string(), "MYSPACE".to_string()];
        let registry = config.build_registry();

        assert_eq!(registry.len(), 9);
        assert!(registry.contains(tags::NETFLIX));
        assert!(!registry.contains(tags::STEAM));
    }
}
