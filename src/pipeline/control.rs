//! Cancellation and progress channels.
//!
//! The pipeline only sees a [`CancelToken`]. External cancel requests arrive
//! through a [`CancellationSource`] (a sentinel file or an in-memory set),
//! and progress leaves through [`ProgressSink`] adapters.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::phase::RunStatus;

/// Shared cancellation flag. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// External "please cancel" signal, keyed by job id.
#[async_trait]
pub trait CancellationSource: Send + Sync {
    /// Return whether cancellation was requested, consuming the request.
    async fn take(&self, job_id: &str) -> bool;
}

/// Sentinel files named `cancel_<job>.txt` in a directory.
#[derive(Debug, Clone)]
pub struct FileCancellation {
    dir: PathBuf,
}

impl FileCancellation {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn sentinel_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("cancel_{}.txt", job_id))
    }

    /// Create the sentinel for a job.
    pub async fn request(&self, job_id: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.sentinel_path(job_id);
        tokio::fs::write(&path, Utc::now().to_rfc3339()).await?;
        Ok(path)
    }
}

#[async_trait]
impl CancellationSource for FileCancellation {
    async fn take(&self, job_id: &str) -> bool {
        let path = self.sentinel_path(job_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Cancellation requested for job {}", job_id);
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                // The sentinel exists but can't be removed; still honor it.
                warn!("Could not remove cancel sentinel {}: {}", path.display(), e);
                true
            }
        }
    }
}

/// In-memory set of pending cancel requests.
#[derive(Debug, Default)]
pub struct MemoryCancellation {
    requested: Mutex<HashSet<String>>,
}

impl MemoryCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, job_id: &str) {
        if let Ok(mut requested) = self.requested.lock() {
            requested.insert(job_id.to_string());
        }
    }

    pub fn is_pending(&self, job_id: &str) -> bool {
        self.requested
            .lock()
            .map(|requested| requested.contains(job_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CancellationSource for MemoryCancellation {
    async fn take(&self, job_id: &str) -> bool {
        self.requested
            .lock()
            .map(|mut requested| requested.remove(job_id))
            .unwrap_or(false)
    }
}

/// Source that never cancels, for runs owned by a supervisor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

#[async_trait]
impl CancellationSource for NeverCancel {
    async fn take(&self, _job_id: &str) -> bool {
        false
    }
}

/// Poll `source` every `interval` and set `token` when a request arrives.
///
/// The task ends once the token is set; abort the handle to stop it early.
pub fn spawn_watcher(
    source: Arc<dyn CancellationSource>,
    job_id: String,
    token: CancelToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if token.is_cancelled() {
                break;
            }
            if source.take(&job_id).await {
                debug!("Watcher observed cancellation for {}", job_id);
                token.cancel();
                break;
            }
        }
    })
}

/// Receives progress checkpoints.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, job_id: &str, percent: u8, status: RunStatus);
}

/// Contents of a `<job>.status.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub job_id: String,
    pub progress: u8,
    pub status: RunStatus,
    pub updated_at: DateTime<Utc>,
}

/// Writes the latest checkpoint of each job to `<dir>/<job>.status.json`.
#[derive(Debug, Clone)]
pub struct JsonStatusFile {
    dir: PathBuf,
}

impl JsonStatusFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.status.json", job_id))
    }

    pub async fn read(&self, job_id: &str) -> anyhow::Result<Option<StatusSnapshot>> {
        let path = self.path(job_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, snapshot: &StatusSnapshot) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(&snapshot.job_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressSink for JsonStatusFile {
    async fn report(&self, job_id: &str, percent: u8, status: RunStatus) {
        let snapshot = StatusSnapshot {
            job_id: job_id.to_string(),
            progress: percent,
            status,
            updated_at: Utc::now(),
        };
        if let Err(e) = self.write(&snapshot).await {
            warn!("Failed to write status for job {}: {}", job_id, e);
        }
    }
}

/// Logs checkpoints through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

#[async_trait]
impl ProgressSink for LogProgress {
    async fn report(&self, job_id: &str, percent: u8, status: RunStatus) {
        info!("Job {}: {}% ({})", job_id, percent, status);
    }
}

/// Keeps every checkpoint in memory.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    reports: Mutex<Vec<(u8, RunStatus)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(u8, RunStatus)> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<(u8, RunStatus)> {
        self.reports().last().copied()
    }
}

#[async_trait]
impl ProgressSink for RecordingProgress {
    async fn report(&self, _job_id: &str, percent: u8, status: RunStatus) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push((percent, status));
        }
    }
}
