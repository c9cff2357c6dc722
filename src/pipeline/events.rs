use tokio::sync::mpsc;

use super::phase::{Phase, RunMode, RunStatus};

/// Events emitted while a run progresses, for UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Run started
    Started { job_id: String, mode: RunMode },
    /// Document decomposed into units
    Mapped { units: usize },
    /// Phase started with this many concurrent tasks (0 for in-line phases)
    PhaseStarted { phase: Phase, tasks: usize },
    /// One task of the current phase finished
    TaskCompleted { phase: Phase },
    /// Phase finished
    PhaseCompleted { phase: Phase },
    /// Checkpoint reported to progress sinks
    Progress { percent: u8, status: RunStatus },
    /// Run stopped before this phase
    Cancelled { phase: Phase },
    /// Run failed
    Failed { error: String },
    /// Run complete
    Completed {
        revisions: usize,
        findings: usize,
        citation_gaps: usize,
    },
}

/// Send an event if anyone is listening. A closed receiver is ignored.
pub(crate) async fn notify(events: &Option<mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
