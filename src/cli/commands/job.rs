//! Job control: cancel requests and status lookups.

use console::style;

use crate::cli::icons::{success, warning};
use crate::config::Config;
use crate::pipeline::{FileCancellation, JsonStatusFile, RunStatus};

pub async fn cmd_cancel(config: &Config, job_id: &str) -> anyhow::Result<()> {
    let base_dir = config.base_dir();
    let source = FileCancellation::new(config.paths.cancel_dir(base_dir.as_deref()));
    let path = source.request(job_id).await?;

    println!("{} Cancellation requested for {}", success(), job_id);
    println!("  {} Signal: {}", style("→").dim(), path.display());
    Ok(())
}

pub async fn cmd_status(config: &Config, job_id: &str, json: bool) -> anyhow::Result<()> {
    let base_dir = config.base_dir();
    let status = JsonStatusFile::new(config.paths.status_dir(base_dir.as_deref()));

    let Some(snapshot) = status.read(job_id).await? else {
        if json {
            println!("null");
        } else {
            println!("{} No status recorded for {}", warning(), job_id);
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let label = match snapshot.status {
        RunStatus::Running => style(snapshot.status.as_str()).cyan(),
        RunStatus::Completed => style(snapshot.status.as_str()).green(),
        RunStatus::Cancelled => style(snapshot.status.as_str()).yellow(),
        RunStatus::Failed => style(snapshot.status.as_str()).red(),
    };
    println!("{} {}% {}", style(job_id).bold(), snapshot.progress, label);
    println!(
        "  {} Updated {}",
        style("→").dim(),
        snapshot.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
