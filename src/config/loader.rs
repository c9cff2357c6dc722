//! Config resolution for the command line.

use std::path::PathBuf;

use super::Config;

/// Where to look for configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`). Takes precedence over discovery.
    pub config_path: Option<PathBuf>,
}

/// Resolve the run configuration.
///
/// An explicit path must load; errors are returned. Without one, the
/// discovered file (if any) is used and failures fall back to defaults.
pub async fn load_config(options: &LoadOptions) -> Result<Config, String> {
    if let Some(path) = &options.config_path {
        let path = super::paths::resolve(&path.to_string_lossy(), None);
        tracing::debug!("Loading config from {}", path.display());
        return Config::load_from_path(&path).await;
    }

    let config = Config::load().await;
    match &config.source_path {
        Some(path) => tracing::debug!("Using discovered config {}", path.display()),
        None => tracing::debug!("No config file found, using defaults"),
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_path_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revisor.toml");
        std::fs::write(&path, "[pipeline]\nlight_workers = 2\n").unwrap();

        let config = load_config(&LoadOptions {
            config_path: Some(path.clone()),
        })
        .await
        .unwrap();
        assert_eq!(config.pipeline.light_workers, 2);
        assert_eq!(config.source_path, Some(path));
        assert_eq!(config.base_dir(), Some(dir.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_explicit_missing_path_errors() {
        let result = load_config(&LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/revisor.toml")),
        })
        .await;
        assert!(result.is_err());
    }
}
