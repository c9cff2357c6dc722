//! Out-of-process run supervision.
//!
//! The supervisor starts `revisor run --ignore-cancel` as a child process,
//! watches the cancellation source while it runs, and owns the terminal
//! status of the job. Cancelling sends SIGTERM and force-kills the child if
//! it has not exited after the grace period. Successful runs append one line
//! to the run ledger, computed from the child's `report.json`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::pipeline::report::REPORT_JSON;
use crate::pipeline::{
    CancellationSource, FileCancellation, JsonStatusFile, ProgressSink, RunMode, RunReport,
    RunRequest, RunStatus, FINAL_PROGRESS, START_PROGRESS,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How a supervised run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisedOutcome {
    Completed { ledger: Option<LedgerEntry> },
    Failed { exit_code: Option<i32> },
    Cancelled,
}

/// One line of `runs.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub job_id: String,
    pub document: String,
    pub mode: RunMode,
    pub duration_secs: f64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_local: f64,
    pub currency: String,
    pub output_dir: String,
}

impl LedgerEntry {
    pub fn from_report(report: &RunReport, output_dir: &Path, duration: Duration) -> Self {
        let total = report.total();
        Self {
            timestamp: Utc::now(),
            job_id: report.job_id.clone(),
            document: report.document.clone(),
            mode: report.mode,
            duration_secs: (duration.as_secs_f64() * 100.0).round() / 100.0,
            tokens_in: total.map(|t| t.tokens_in).unwrap_or(0),
            tokens_out: total.map(|t| t.tokens_out).unwrap_or(0),
            cost_local: total.map(|t| t.cost_local).unwrap_or(0.0),
            currency: report.currency.clone(),
            output_dir: output_dir.display().to_string(),
        }
    }
}

/// Append one JSON line to the ledger file, creating it if needed.
pub async fn append_ledger(path: &Path, entry: &LedgerEntry) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open ledger {}", path.display()))?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

pub struct Supervisor {
    program: PathBuf,
    prefix_args: Vec<OsString>,
    config_path: Option<PathBuf>,
    cancellation: Arc<dyn CancellationSource>,
    status: JsonStatusFile,
    ledger_path: PathBuf,
    poll_interval: Duration,
    grace_period: Duration,
}

impl Supervisor {
    pub fn new(
        program: impl Into<PathBuf>,
        cancellation: Arc<dyn CancellationSource>,
        status: JsonStatusFile,
        ledger_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            config_path: None,
            cancellation,
            status,
            ledger_path: ledger_path.into(),
            poll_interval: POLL_INTERVAL,
            grace_period: GRACE_PERIOD,
        }
    }

    /// Supervise the current executable with the configured directories.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let program = std::env::current_exe().context("Cannot locate the revisor executable")?;
        let base_dir = config.base_dir();
        let base_dir = base_dir.as_deref();

        let mut supervisor = Self::new(
            program,
            Arc::new(FileCancellation::new(config.paths.cancel_dir(base_dir))),
            JsonStatusFile::new(config.paths.status_dir(base_dir)),
            config.paths.ledger_file(base_dir),
        );
        supervisor.config_path = config.source_path.clone();
        Ok(supervisor)
    }

    /// Arguments placed before the `run` subcommand, for wrapper programs.
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Full argument list for the child run.
    pub fn child_args(&self, request: &RunRequest) -> Vec<OsString> {
        let mut args = self.prefix_args.clone();
        if let Some(config) = &self.config_path {
            args.push("--config".into());
            args.push(config.clone().into_os_string());
        }
        args.extend([
            OsString::from("run"),
            request.document.clone().into_os_string(),
            "--job-id".into(),
            request.job_id.clone().into(),
            "--mode".into(),
            request.mode.as_str().into(),
            "--output".into(),
            request.output_dir.clone().into_os_string(),
            "--ignore-cancel".into(),
        ]);
        args
    }

    pub async fn supervise(&self, request: &RunRequest) -> anyhow::Result<SupervisedOutcome> {
        let job_id = request.job_id.as_str();
        self.status.report(job_id, START_PROGRESS, RunStatus::Running).await;

        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(self.child_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;
        info!("Started run {} as pid {:?}", job_id, child.id());

        let exit = match self.wait_or_cancel(&mut child, job_id).await {
            Ok(Some(exit)) => exit,
            Ok(None) => {
                self.terminate(&mut child).await;
                let progress = self.last_progress(job_id).await;
                self.status.report(job_id, progress, RunStatus::Cancelled).await;
                info!("Run {} cancelled", job_id);
                return Ok(SupervisedOutcome::Cancelled);
            }
            Err(e) => {
                self.status.report(job_id, FINAL_PROGRESS, RunStatus::Failed).await;
                return Err(e.into());
            }
        };

        if !exit.success() {
            warn!("Run {} exited with {}", job_id, exit);
            self.status.report(job_id, FINAL_PROGRESS, RunStatus::Failed).await;
            return Ok(SupervisedOutcome::Failed {
                exit_code: exit.code(),
            });
        }

        let ledger = self.record_run(request, started.elapsed()).await;
        self.status.report(job_id, FINAL_PROGRESS, RunStatus::Completed).await;
        Ok(SupervisedOutcome::Completed { ledger })
    }

    /// Wait for the child, returning `None` if cancellation arrives first.
    async fn wait_or_cancel(
        &self,
        child: &mut Child,
        job_id: &str,
    ) -> std::io::Result<Option<ExitStatus>> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                status = child.wait() => return status.map(Some),
                _ = ticker.tick() => {
                    if self.cancellation.take(job_id).await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn terminate(&self, child: &mut Child) {
        if let Some(pid) = child.id() {
            if send_sigterm(pid) {
                match tokio::time::timeout(self.grace_period, child.wait()).await {
                    Ok(_) => {
                        debug!("Child {} exited after SIGTERM", pid);
                        return;
                    }
                    Err(_) => warn!("Child {} still running after {:?}, killing", pid, self.grace_period),
                }
            }
        }
        if let Err(e) = child.kill().await {
            warn!("Failed to kill child: {}", e);
        }
    }

    async fn last_progress(&self, job_id: &str) -> u8 {
        match self.status.read(job_id).await {
            Ok(Some(snapshot)) => snapshot.progress,
            _ => START_PROGRESS,
        }
    }

    async fn record_run(&self, request: &RunRequest, duration: Duration) -> Option<LedgerEntry> {
        let output_dir = request.artifact_dir();
        let report_path = output_dir.join(REPORT_JSON);
        let report = match RunReport::read(&report_path).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Cannot read {}: {}", report_path.display(), e);
                return None;
            }
        };

        let entry = LedgerEntry::from_report(&report, &output_dir, duration);
        if let Err(e) = append_ledger(&self.ledger_path, &entry).await {
            warn!("Failed to append run ledger: {}", e);
            return None;
        }
        Some(entry)
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> bool {
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> bool {
    false
}
