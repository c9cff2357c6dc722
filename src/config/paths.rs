//! Filesystem locations used by runs and the supervisor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for all other default paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Where report artifacts are written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Directory polled for `cancel_<job>.txt` sentinel files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_dir: Option<String>,
    /// Directory holding `<job>.status.json` progress files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_dir: Option<String>,
    /// Append-only run ledger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_file: Option<String>,
}

impl PathsConfig {
    /// Resolved data root. Defaults to the platform's local data dir.
    pub fn data_dir(&self, base_dir: Option<&Path>) -> PathBuf {
        match &self.data_dir {
            Some(dir) => resolve(dir, base_dir),
            None => dirs::data_local_dir()
                .map(|d| d.join(super::APP_NAME))
                .unwrap_or_else(|| PathBuf::from(".revisor")),
        }
    }

    pub fn output_dir(&self, base_dir: Option<&Path>) -> PathBuf {
        self.child_or(&self.output_dir, "output", base_dir)
    }

    pub fn cancel_dir(&self, base_dir: Option<&Path>) -> PathBuf {
        self.child_or(&self.cancel_dir, "cancel", base_dir)
    }

    pub fn status_dir(&self, base_dir: Option<&Path>) -> PathBuf {
        self.child_or(&self.status_dir, "status", base_dir)
    }

    pub fn ledger_file(&self, base_dir: Option<&Path>) -> PathBuf {
        self.child_or(&self.ledger_file, "runs.jsonl", base_dir)
    }

    fn child_or(&self, value: &Option<String>, default: &str, base_dir: Option<&Path>) -> PathBuf {
        match value {
            Some(path) => resolve(path, base_dir),
            None => self.data_dir(base_dir).join(default),
        }
    }
}

/// Expand `~` and env vars, then resolve relative paths against `base_dir`.
pub(crate) fn resolve(path: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string());
    let path = PathBuf::from(expanded);

    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
