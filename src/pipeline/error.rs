use std::path::PathBuf;

use thiserror::Error;

use crate::document::DocumentError;

/// Errors that end a run in the failed state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
