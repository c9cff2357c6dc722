//! In-process pipeline run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;

use crate::cli::icons::{arrow, success, warning};
use crate::cli::progress;
use crate::config::Config;
use crate::pipeline::{
    NeverCancel, PipelineEvent, PipelineOrchestrator, RunMode, RunOutcome, RunRequest,
};

pub async fn cmd_run(
    config: &Config,
    document: &Path,
    mode: RunMode,
    output: Option<PathBuf>,
    job_id: Option<String>,
    ignore_cancel: bool,
) -> anyhow::Result<()> {
    let request = build_request(config, document, mode, output, job_id);

    let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>(100);
    let mut orchestrator = PipelineOrchestrator::from_config(config)?.with_events(event_tx);
    if ignore_cancel {
        orchestrator = orchestrator.with_cancellation(Arc::new(NeverCancel));
    }

    println!(
        "{} Job {} ({} mode): {}",
        arrow(),
        style(&request.job_id).bold(),
        mode,
        document.display()
    );
    if !ignore_cancel {
        println!(
            "  {} Cancel with: revisor cancel {}",
            style("→").dim(),
            request.job_id
        );
    }

    // Spawn event handler for UI
    let display = tokio::spawn(progress::render_events(event_rx));
    let outcome = orchestrator.run(request).await;
    // Closing the channel ends the display task.
    drop(orchestrator);
    let _ = display.await;

    match outcome {
        RunOutcome::Completed { report, artifacts } => {
            println!(
                "{} {} corrections, {} findings, {} citation gaps",
                success(),
                report.revisions.len(),
                report.findings.len(),
                report.citation_gaps.len()
            );
            if let Some(total) = report.total() {
                println!(
                    "  {} Tokens: {} in / {} out, cost {:.4} USD ({:.2} {})",
                    style("→").dim(),
                    total.tokens_in,
                    total.tokens_out,
                    total.cost_usd,
                    total.cost_local,
                    report.currency
                );
            }
            println!("  {} Document: {}", style("→").dim(), artifacts.document.display());
            println!("  {} Report: {}", style("→").dim(), artifacts.markdown.display());
            Ok(())
        }
        RunOutcome::Cancelled { phase, progress } => {
            println!(
                "{} Cancelled at {} ({}%)",
                warning(),
                phase.label().to_lowercase(),
                progress
            );
            Ok(())
        }
        RunOutcome::Failed { error } => Err(error.into()),
    }
}

pub(super) fn build_request(
    config: &Config,
    document: &Path,
    mode: RunMode,
    output: Option<PathBuf>,
    job_id: Option<String>,
) -> RunRequest {
    let output = output.unwrap_or_else(|| config.paths.output_dir(config.base_dir().as_deref()));
    let request = RunRequest::new(document, mode, output);
    match job_id {
        Some(id) => request.with_job_id(id),
        None => request,
    }
}
