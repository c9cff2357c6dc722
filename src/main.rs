//! Revisor - concurrent document review pipeline.
//!
//! Corrects language errors, validates references, numbers and tables,
//! and reports logical inconsistencies in parsed documents.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use revisor::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // REVISOR_LOG, then RUST_LOG, then the verbosity default.
    let filter = EnvFilter::try_from_env(cli::LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| cli::default_log_directive(cli::is_verbose()).into());

    // Logs go to stderr; stdout carries reports and `status --json`.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    cli::run().await
}
