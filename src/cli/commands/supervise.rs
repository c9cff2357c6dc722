//! Supervised pipeline run in a child process.

use std::path::{Path, PathBuf};

use console::style;

use crate::cli::icons::{arrow, success, warning};
use crate::config::Config;
use crate::pipeline::RunMode;
use crate::supervisor::{SupervisedOutcome, Supervisor};

use super::run::build_request;

pub async fn cmd_supervise(
    config: &Config,
    document: &Path,
    mode: RunMode,
    output: Option<PathBuf>,
    job_id: Option<String>,
) -> anyhow::Result<()> {
    let request = build_request(config, document, mode, output, job_id);
    let supervisor = Supervisor::from_config(config)?;

    println!(
        "{} Supervising job {} ({} mode): {}",
        arrow(),
        style(&request.job_id).bold(),
        mode,
        document.display()
    );
    println!(
        "  {} Cancel with: revisor cancel {}",
        style("→").dim(),
        request.job_id
    );

    match supervisor.supervise(&request).await? {
        SupervisedOutcome::Completed { ledger } => {
            println!("{} Job {} completed", success(), request.job_id);
            if let Some(entry) = ledger {
                println!(
                    "  {} {:.1}s, {} tokens in / {} out, {:.2} {}",
                    style("→").dim(),
                    entry.duration_secs,
                    entry.tokens_in,
                    entry.tokens_out,
                    entry.cost_local,
                    entry.currency
                );
            }
            Ok(())
        }
        SupervisedOutcome::Cancelled => {
            println!("{} Job {} cancelled", warning(), request.job_id);
            Ok(())
        }
        SupervisedOutcome::Failed { exit_code } => match exit_code {
            Some(code) => anyhow::bail!("Job {} failed with exit code {}", request.job_id, code),
            None => anyhow::bail!("Job {} was terminated by a signal", request.job_id),
        },
    }
}
