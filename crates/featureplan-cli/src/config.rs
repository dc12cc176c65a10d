//! CLI configuration handling

use anyhow::{Context, Result};
use featureplan_processor::ProcessorConfig;
use featureplan_registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_LOCATIONS: [&str; 4] = [
    ".featureplan/config.yaml",
    ".featureplan/config.yml",
    "featureplan.yaml",
    "featureplan.yml",
];

/// CLI configuration
///
/// ```yaml
/// registry:
///   type: sqlite
///   path: .featureplan/registry.db
///   namespace: default
/// processor:
///   max_concurrent_jobs: 4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub processor: ProcessorConfig,
}

/// Load configuration from file or defaults
///
/// `registry_path` replaces the registry with a SQLite database at that path,
/// keeping the configured namespace.
pub fn load_config(config_path: Option<&str>, registry_path: Option<&str>) -> Result<CliConfig> {
    let mut config = match config_path {
        Some(path) => load_from_file(path)?,
        None => match DEFAULT_LOCATIONS.iter().find(|l| Path::new(l).exists()) {
            Some(location) => load_from_file(location)?,
            None => CliConfig::default(),
        },
    };

    if let Some(path) = registry_path {
        config.registry = RegistryConfig::Sqlite {
            path: path.to_string(),
            namespace: config.registry.namespace().to_string(),
        };
    }
    Ok(config)
}

fn load_from_file(path: &str) -> Result<CliConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path))?;

    if path.ends_with(".json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path))
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = load_config(None, None).unwrap();

        assert_eq!(config.registry, RegistryConfig::default());
        assert_eq!(config.processor.max_concurrent_jobs, 4);
    }

    #[test]
    fn test_load_yaml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
registry:
  type: sqlite
  path: /custom/registry.db
  namespace: analytics
processor:
  max_concurrent_jobs: 8
  supports_ttl: true
"#;
        std::fs::write(&config_path, yaml_content).unwrap();

        let config = load_from_file(config_path.to_str().unwrap()).unwrap();

        assert_eq!(
            config.registry,
            RegistryConfig::Sqlite {
                path: "/custom/registry.db".to_string(),
                namespace: "analytics".to_string(),
            }
        );
        assert_eq!(config.processor.max_concurrent_jobs, 8);
        assert!(config.processor.supports_ttl);
        assert!(config.processor.supports_time_range);
    }

    #[test]
    fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json_content = r#"{ "registry": { "type": "local", "namespace": "scratch" } }"#;
        std::fs::write(&config_path, json_content).unwrap();

        let config = load_from_file(config_path.to_str().unwrap()).unwrap();

        assert_eq!(config.registry, RegistryConfig::local("scratch"));
        assert_eq!(config.processor, ProcessorConfig::default());
    }

    #[test]
    fn test_registry_path_override_keeps_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("explicit.yaml");
        std::fs::write(&config_path, "registry:\n  type: local\n  namespace: team-a\n").unwrap();

        let config =
            load_config(Some(config_path.to_str().unwrap()), Some("/tmp/other.db")).unwrap();

        assert_eq!(
            config.registry,
            RegistryConfig::Sqlite {
                path: "/tmp/other.db".to_string(),
                namespace: "team-a".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_config_file_not_found() {
        let result = load_from_file("/nonexistent/config.yaml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }

    #[test]
    fn test_unknown_registry_type() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");
        std::fs::write(&config_path, "registry:\n  type: postgres\n").unwrap();

        assert!(load_from_file(config_path.to_str().unwrap()).is_err());
    }
}
