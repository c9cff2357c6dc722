//! Terminal progress display fed by pipeline events.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use super::icons::{arrow, error as error_icon, success};
use crate::pipeline::{PipelineEvent, RunStatus};

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

/// Consume events until the sender side is dropped.
pub async fn render_events(mut event_rx: mpsc::Receiver<PipelineEvent>) {
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = event_rx.recv().await {
        match event {
            PipelineEvent::Started { .. } => {}
            PipelineEvent::Mapped { units } => {
                println!("  {} {} content units", style("→").dim(), units);
            }
            PipelineEvent::PhaseStarted { phase, tasks } => {
                if tasks > 0 {
                    let progress = ProgressBar::new(tasks as u64);
                    progress.set_style(bar_style());
                    progress.set_message(format!("{}...", phase.label()));
                    bar = Some(progress);
                } else {
                    println!("{} {}", arrow(), phase.label());
                }
            }
            PipelineEvent::TaskCompleted { .. } => {
                if let Some(ref progress) = bar {
                    progress.inc(1);
                }
            }
            PipelineEvent::PhaseCompleted { phase } => {
                if let Some(progress) = bar.take() {
                    progress.finish_and_clear();
                    println!("{} {}", success(), phase.label());
                }
            }
            PipelineEvent::Progress { percent, status } => {
                if status == RunStatus::Running {
                    tracing::debug!("Progress {}%", percent);
                }
            }
            PipelineEvent::Cancelled { .. } | PipelineEvent::Completed { .. } => {
                if let Some(progress) = bar.take() {
                    progress.finish_and_clear();
                }
            }
            PipelineEvent::Failed { error } => {
                if let Some(progress) = bar.take() {
                    progress.finish_and_clear();
                }
                eprintln!("{} {}", error_icon(), error);
            }
        }
    }
}
