//! Configuration for revisor.
//!
//! Built once at startup and passed by reference into every component.
//! Sections:
//! - `llm`: inference provider, retry policy and prompt overrides
//! - `pipeline`: worker pool sizes and acceptance thresholds
//! - `rules`: keyword sets, header synonyms and arithmetic tolerance
//! - `costs`: token prices and exchange rate
//! - `paths`: input/output, cancel-signal and status directories

mod loader;
mod paths;
mod pipeline;
mod rules;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use crate::llm::LlmConfig;
pub use loader::{load_config, LoadOptions};
pub use paths::PathsConfig;
pub use pipeline::{CostConfig, PipelineConfig};
pub use rules::{HeaderSynonyms, RuleConfig};

/// Application name used for config discovery.
pub const APP_NAME: &str = "revisor";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub rules: RuleConfig,
    #[serde(default)]
    pub costs: CostConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    /// File the config was read from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults with env overrides when no file is found.
    pub async fn load() -> Self {
        match prefer::load(APP_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Defaults with environment overrides applied.
    pub fn default_with_env() -> Self {
        let mut config = Self::default();
        config.llm = config.llm.with_env_overrides();
        config
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;

        config.source_path = Some(path.to_path_buf());
        config.llm = config.llm.with_env_overrides();
        Ok(config)
    }

    /// Parse config text in the given format (`toml`, `yaml`/`yml`, anything else is JSON).
    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Base directory for resolving relative paths (the config file's directory).
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.heavy_workers, 5);
        assert_eq!(config.pipeline.light_workers, 10);
        assert!((config.pipeline.similarity_threshold - 0.999).abs() < f64::EPSILON);
        assert!((config.rules.tolerance - 0.009).abs() < f64::EPSILON);
        assert!((config.costs.exchange_rate - 5.65).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_toml_partial() {
        let config = Config::parse(
            r#"
[pipeline]
heavy_workers = 3

[rules]
tolerance = 0.5
after_keywords = ["later than"]
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(config.pipeline.heavy_workers, 3);
        assert_eq!(config.pipeline.light_workers, 10);
        assert!((config.rules.tolerance - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.rules.after_keywords, vec!["later than".to_string()]);
        assert!(!config.rules.before_keywords.is_empty());
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = Config::parse("costs:\n  exchange_rate: 1.0\n", "yml").unwrap();
        assert!((yaml.costs.exchange_rate - 1.0).abs() < f64::EPSILON);

        let json = Config::parse(r#"{"llm": {"max_attempts": 4}}"#, "json").unwrap();
        assert_eq!(json.llm.max_attempts, 4);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Config::parse("not = [valid", "toml").is_err());
    }
}
