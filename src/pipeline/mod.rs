//! Document analysis pipeline.
//!
//! The orchestrator owns all run state (units, findings, revisions, cost
//! ledger) and drives the phases of the selected [`RunMode`] strictly in
//! sequence. Inference-heavy phases fan out over a [`WorkerPool`]; workers
//! only return results, and the orchestrator applies them in unit order.
//!
//! Cancellation is checked before the run starts and between phases, and a
//! background watcher sets the shared token so pools stop submitting work.
//! A phase that ends with the token set is reported as cancelled, never as
//! completed.

pub mod control;
pub mod cost;
mod error;
pub mod events;
pub mod phase;
pub mod pool;
pub mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{Config, CostConfig, PipelineConfig};
use crate::document::{ContentMapper, Document};
use crate::llm::InferenceGateway;
use crate::models::{
    Anchor, CitationGap, ContentUnit, RevisionKind, RevisionRecord, UnitKind, ValidationFinding,
};
use crate::rules::RuleValidator;
use crate::services::{
    find_citation_gaps, Classifier, ContentAnalyzer, Dossier, GlobalAnalysis,
    GlobalConsistencyAnalyzer, HttpProbe, LabelSet, LinkProbe, Reviser, UnitAnalysis,
};

pub use control::{
    CancelToken, CancellationSource, FileCancellation, JsonStatusFile, LogProgress,
    MemoryCancellation, NeverCancel, ProgressSink, RecordingProgress, StatusSnapshot,
};
pub use cost::{CostLedger, CostRow, TokenUsage};
pub use error::PipelineError;
pub use events::PipelineEvent;
pub use phase::{Phase, RunMode, RunStatus, FINAL_PROGRESS, START_PROGRESS};
pub use pool::WorkerPool;
pub use report::{ReportPaths, RunReport};

use events::notify;

/// Timeout for DOI/URL reachability probes.
const LINK_PROBE_TIMEOUT: Duration = Duration::from_secs(7);

/// One document to process.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub job_id: String,
    pub document: PathBuf,
    pub mode: RunMode,
    /// Outputs go to `<output_dir>/<document stem>/`.
    pub output_dir: PathBuf,
}

impl RunRequest {
    pub fn new(document: impl Into<PathBuf>, mode: RunMode, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            document: document.into(),
            mode,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    /// Output directory for this document.
    pub fn artifact_dir(&self) -> PathBuf {
        self.output_dir.join(self.stem())
    }

    pub fn stem(&self) -> String {
        self.document
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document")
            .to_string()
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        report: RunReport,
        artifacts: ReportPaths,
    },
    /// Stopped before or during `phase`; `progress` is the checkpoint of the
    /// last phase that completed.
    Cancelled { phase: Phase, progress: u8 },
    Failed { error: PipelineError },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Completed { .. } => RunStatus::Completed,
            RunOutcome::Cancelled { .. } => RunStatus::Cancelled,
            RunOutcome::Failed { .. } => RunStatus::Failed,
        }
    }
}

/// Everything a run accumulates between phases.
struct RunState {
    started_at: DateTime<Utc>,
    started: Instant,
    document: Document,
    units: Vec<ContentUnit>,
    ledger: CostLedger,
    revisions: Vec<RevisionRecord>,
    findings: Vec<ValidationFinding>,
    citation_gaps: Vec<CitationGap>,
    analyses: Vec<UnitAnalysis>,
    global: Option<GlobalAnalysis>,
}

enum Execution {
    Finished(RunReport, ReportPaths),
    Cancelled(Phase),
}

pub struct PipelineOrchestrator {
    settings: PipelineConfig,
    costs: CostConfig,
    validator: RuleValidator,
    gateway: InferenceGateway,
    textual_prompt: String,
    global_prompt: String,
    probe: Option<Arc<dyn LinkProbe>>,
    cancellation: Arc<dyn CancellationSource>,
    progress: Vec<Arc<dyn ProgressSink>>,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

impl PipelineOrchestrator {
    /// Orchestrator with no link probing, no external cancellation and no
    /// progress sinks. Add them with the `with_*` builders.
    pub fn new(config: &Config, gateway: InferenceGateway) -> Self {
        Self {
            settings: config.pipeline.clone(),
            costs: config.costs.clone(),
            validator: RuleValidator::new(config.rules.clone()),
            gateway,
            textual_prompt: config.llm.get_textual_prompt().to_string(),
            global_prompt: config.llm.get_global_prompt().to_string(),
            probe: None,
            cancellation: Arc::new(NeverCancel),
            progress: Vec::new(),
            events: None,
        }
    }

    /// Production wiring: configured LLM provider, HTTP link probe, sentinel
    /// file cancellation, JSON status files and log progress.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let gateway = InferenceGateway::from_config(&config.llm)?;
        let probe = HttpProbe::new(LINK_PROBE_TIMEOUT)?;
        let base_dir = config.base_dir();
        let base_dir = base_dir.as_deref();

        Ok(Self::new(config, gateway)
            .with_probe(Arc::new(probe))
            .with_cancellation(Arc::new(FileCancellation::new(
                config.paths.cancel_dir(base_dir),
            )))
            .with_progress(Arc::new(JsonStatusFile::new(config.paths.status_dir(base_dir))))
            .with_progress(Arc::new(LogProgress)))
    }

    pub fn with_probe(mut self, probe: Arc<dyn LinkProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_cancellation(mut self, source: Arc<dyn CancellationSource>) -> Self {
        self.cancellation = source;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress.push(sink);
        self
    }

    pub fn with_events(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run the pipeline for one document. Never panics on bad input; every
    /// failure is folded into the outcome.
    pub async fn run(&self, request: RunRequest) -> RunOutcome {
        info!(
            "Starting {} run {} for {}",
            request.mode,
            request.job_id,
            request.document.display()
        );
        notify(
            &self.events,
            PipelineEvent::Started {
                job_id: request.job_id.clone(),
                mode: request.mode,
            },
        )
        .await;

        let token = CancelToken::new();
        let mut progress = START_PROGRESS;
        self.checkpoint(&request.job_id, progress, RunStatus::Running)
            .await;

        let watcher = control::spawn_watcher(
            self.cancellation.clone(),
            request.job_id.clone(),
            token.clone(),
            Duration::from_millis(self.settings.cancel_poll_ms.max(10)),
        );
        let result = self.execute(&request, &token, &mut progress).await;
        watcher.abort();

        match result {
            Ok(Execution::Finished(report, artifacts)) => {
                info!(
                    "Run {} completed: {} revisions, {} findings, {} citation gaps",
                    request.job_id,
                    report.revisions.len(),
                    report.findings.len(),
                    report.citation_gaps.len()
                );
                self.checkpoint(&request.job_id, FINAL_PROGRESS, RunStatus::Completed)
                    .await;
                notify(
                    &self.events,
                    PipelineEvent::Completed {
                        revisions: report.revisions.len(),
                        findings: report.findings.len(),
                        citation_gaps: report.citation_gaps.len(),
                    },
                )
                .await;
                RunOutcome::Completed { report, artifacts }
            }
            Ok(Execution::Cancelled(phase)) => {
                info!("Run {} cancelled at {}", request.job_id, phase);
                self.checkpoint(&request.job_id, progress, RunStatus::Cancelled)
                    .await;
                notify(&self.events, PipelineEvent::Cancelled { phase }).await;
                RunOutcome::Cancelled { phase, progress }
            }
            Err(e) => {
                error!("Run {} failed: {}", request.job_id, e);
                self.checkpoint(&request.job_id, FINAL_PROGRESS, RunStatus::Failed)
                    .await;
                notify(
                    &self.events,
                    PipelineEvent::Failed {
                        error: e.to_string(),
                    },
                )
                .await;
                RunOutcome::Failed { error: e }
            }
        }
    }

    async fn execute(
        &self,
        request: &RunRequest,
        token: &CancelToken,
        progress: &mut u8,
    ) -> Result<Execution, PipelineError> {
        let mode = request.mode;

        if self.cancel_requested(&request.job_id, token).await {
            return Ok(Execution::Cancelled(Phase::Mapping));
        }
        let mut state = self.map(request).await?;
        if token.is_cancelled() {
            return Ok(Execution::Cancelled(Phase::Mapping));
        }
        self.complete_phase(&request.job_id, Phase::Mapping, progress)
            .await;

        let mut finished = None;
        for &phase in mode.phases() {
            if phase == Phase::Mapping {
                continue;
            }
            if self.cancel_requested(&request.job_id, token).await {
                return Ok(Execution::Cancelled(phase));
            }

            match phase {
                Phase::Mapping => {}
                Phase::Classifying => self.classify(&mut state, mode, token).await,
                Phase::Revising => self.revise(&mut state, mode, token).await,
                Phase::CrossChecking => self.cross_check(&mut state).await,
                Phase::RuleValidating => self.validate_rules(&mut state).await,
                Phase::AiAnalyzing => self.analyze_units(&mut state, mode, token).await,
                Phase::Aggregating => self.aggregate(&mut state).await,
                Phase::Finalizing => finished = Some(self.finalize(&mut state, request).await?),
            }

            // Set mid-phase: pools may have skipped units.
            if token.is_cancelled() {
                return Ok(Execution::Cancelled(phase));
            }
            self.complete_phase(&request.job_id, phase, progress).await;
        }

        let (report, artifacts) =
            finished.ok_or_else(|| anyhow::anyhow!("run mode {} never finalized", mode))?;
        Ok(Execution::Finished(report, artifacts))
    }

    async fn map(&self, request: &RunRequest) -> Result<RunState, PipelineError> {
        notify(
            &self.events,
            PipelineEvent::PhaseStarted {
                phase: Phase::Mapping,
                tasks: 0,
            },
        )
        .await;

        let document = Document::open(&request.document).await?;
        let units = match request.mode {
            RunMode::Textual => ContentMapper::map_all_paragraphs(&document),
            _ => ContentMapper::map(&document),
        };
        info!("Mapped {} content units", units.len());
        notify(&self.events, PipelineEvent::Mapped { units: units.len() }).await;

        Ok(RunState {
            started_at: Utc::now(),
            started: Instant::now(),
            document,
            units,
            ledger: CostLedger::new(),
            revisions: Vec::new(),
            findings: Vec::new(),
            citation_gaps: Vec::new(),
            analyses: Vec::new(),
            global: None,
        })
    }

    async fn classify(&self, state: &mut RunState, mode: RunMode, token: &CancelToken) {
        let labels = match mode {
            RunMode::Full => LabelSet::Full,
            _ => LabelSet::Binary,
        };
        let classifier = Classifier::new(self.gateway.clone(), labels);

        let (indices, texts): (Vec<usize>, Vec<String>) = state
            .units
            .iter()
            .enumerate()
            .filter(|(_, unit)| {
                unit.is_textual()
                    && !unit.raw_content.trim().is_empty()
                    && self.long_enough(unit, mode)
            })
            .map(|(i, unit)| (i, unit.raw_content.clone()))
            .unzip();

        self.phase_started(Phase::Classifying, texts.len()).await;
        let events = self.events.clone();
        let results = self
            .pool(mode)
            .run(texts, token, move |text| {
                let classifier = classifier.clone();
                let events = events.clone();
                async move {
                    let result = classifier.classify(&text).await;
                    notify(&events, PipelineEvent::TaskCompleted { phase: Phase::Classifying }).await;
                    result
                }
            })
            .await;

        for (index, result) in indices.into_iter().zip(results) {
            if let Some(classification) = result {
                state.units[index].category = Some(classification.category);
                state.ledger.record(cost::CLASSIFICATION, classification.usage);
            }
        }
    }

    async fn revise(&self, state: &mut RunState, mode: RunMode, token: &CancelToken) {
        let mut reviser = Reviser::new(
            self.gateway.clone(),
            &self.textual_prompt,
            self.settings.similarity_threshold,
        );
        if mode != RunMode::Full {
            reviser = reviser.without_justification();
        }
        if let Some(probe) = &self.probe {
            reviser = reviser.with_probe(probe.clone());
        }

        let (indices, targets): (Vec<usize>, Vec<(String, String, RevisionKind)>) = state
            .units
            .iter()
            .enumerate()
            .filter_map(|(i, unit)| {
                let kind = Reviser::kind_for(unit.category())?;
                if mode == RunMode::Textual && kind != RevisionKind::Textual {
                    return None;
                }
                Some((i, (unit.origin.clone(), unit.raw_content.clone(), kind)))
            })
            .unzip();

        self.phase_started(Phase::Revising, targets.len()).await;
        let events = self.events.clone();
        let results = self
            .pool(mode)
            .run(targets, token, move |(origin, text, kind)| {
                let reviser = reviser.clone();
                let events = events.clone();
                async move {
                    let outcome = reviser.revise(&origin, &text, kind).await;
                    notify(&events, PipelineEvent::TaskCompleted { phase: Phase::Revising }).await;
                    outcome
                }
            })
            .await;

        for (index, result) in indices.into_iter().zip(results) {
            let Some(outcome) = result else {
                continue;
            };
            state
                .ledger
                .record(outcome.kind.ledger_phase(), outcome.correction_usage);
            state
                .ledger
                .record(cost::JUSTIFICATION, outcome.justification_usage);
            if let Some(record) = outcome.record {
                state.units[index].corrected_content = Some(record.corrected_text.clone());
                state.revisions.push(record);
            }
        }
        info!("Accepted {} corrections", state.revisions.len());
    }

    async fn cross_check(&self, state: &mut RunState) {
        self.phase_started(Phase::CrossChecking, 0).await;
        state.citation_gaps = find_citation_gaps(&state.units);
        info!("Found {} citation gaps", state.citation_gaps.len());
    }

    async fn validate_rules(&self, state: &mut RunState) {
        self.phase_started(Phase::RuleValidating, 0).await;

        for unit in &state.units {
            let found = match (unit.kind, &unit.anchor) {
                (UnitKind::Text | UnitKind::TableCell, _) => {
                    self.validator.validate_text(unit.effective_text())
                }
                (UnitKind::TableObject, Anchor::Table { table }) => state
                    .document
                    .table_grid(*table)
                    .map(|grid| self.validator.validate_table(&grid))
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            state
                .findings
                .extend(found.into_iter().map(|f| f.with_origin(&unit.origin)));
        }
        info!("Rule validation produced {} findings", state.findings.len());
    }

    async fn analyze_units(&self, state: &mut RunState, mode: RunMode, token: &CancelToken) {
        let analyzer = ContentAnalyzer::new(self.gateway.clone());

        let targets: Vec<ContentUnit> = state
            .units
            .iter()
            .filter(|unit| match unit.kind {
                UnitKind::Image => unit.image_blob.is_some(),
                UnitKind::Text | UnitKind::TableCell => {
                    !unit.effective_text().trim().is_empty() && self.long_enough(unit, mode)
                }
                UnitKind::TableObject => false,
            })
            .cloned()
            .collect();

        self.phase_started(Phase::AiAnalyzing, targets.len()).await;
        let events = self.events.clone();
        let results = self
            .pool(mode)
            .run(targets, token, move |unit| {
                let analyzer = analyzer.clone();
                let events = events.clone();
                async move {
                    let analysis = analyzer.analyze(&unit).await;
                    notify(&events, PipelineEvent::TaskCompleted { phase: Phase::AiAnalyzing }).await;
                    analysis
                }
            })
            .await;

        for analysis in results.into_iter().flatten() {
            state.ledger.record(cost::CONTENT_ANALYSIS, analysis.usage);
            state.analyses.push(analysis);
        }
    }

    async fn aggregate(&self, state: &mut RunState) {
        self.phase_started(Phase::Aggregating, 0).await;

        let mut dossier = Dossier::new();
        for finding in &state.findings {
            dossier.push_finding(finding);
        }
        for analysis in &state.analyses {
            if let Some(text) = &analysis.text {
                dossier.push_analysis(&analysis.origin, text);
            }
        }

        let analyzer = GlobalConsistencyAnalyzer::new(self.gateway.clone(), &self.global_prompt);
        let (global, usage) = analyzer.analyze(dossier).await;
        state.ledger.record(cost::GLOBAL_ANALYSIS, usage);
        state.global = Some(global);
    }

    async fn finalize(
        &self,
        state: &mut RunState,
        request: &RunRequest,
    ) -> Result<(RunReport, ReportPaths), PipelineError> {
        self.phase_started(Phase::Finalizing, 0).await;

        for unit in &state.units {
            if let Some(corrected) = &unit.corrected_content {
                if !state.document.set_text(&unit.anchor, corrected) {
                    warn!("Could not write correction back to {}", unit.origin);
                }
            }
        }

        let dir = request.artifact_dir();
        let revised = dir.join(format!("{}_revised.json", request.stem()));
        state.document.save(&revised).await?;

        let report = RunReport {
            job_id: request.job_id.clone(),
            document: request.document.display().to_string(),
            mode: request.mode,
            started_at: state.started_at,
            duration_secs: state.started.elapsed().as_secs_f64(),
            units: state.units.len(),
            revisions: state.revisions.clone(),
            findings: state.findings.clone(),
            citation_gaps: state.citation_gaps.clone(),
            global_analysis: state.global.as_ref().map(|g| g.text().to_string()),
            costs: state.ledger.rows(&self.costs),
            currency: self.costs.currency.clone(),
        };
        let (json, markdown) = report.write(&dir).await?;
        info!("Wrote outputs to {}", dir.display());

        Ok((
            report,
            ReportPaths {
                dir,
                document: revised,
                json,
                markdown,
            },
        ))
    }

    fn pool(&self, mode: RunMode) -> WorkerPool {
        if mode.uses_light_pool() {
            WorkerPool::new(self.settings.light_workers)
        } else {
            WorkerPool::new(self.settings.heavy_workers)
        }
    }

    fn long_enough(&self, unit: &ContentUnit, mode: RunMode) -> bool {
        !mode.skips_short_units()
            || unit.effective_text().chars().count() > self.settings.min_unit_chars
    }

    async fn cancel_requested(&self, job_id: &str, token: &CancelToken) -> bool {
        if token.is_cancelled() {
            return true;
        }
        if self.cancellation.take(job_id).await {
            token.cancel();
            return true;
        }
        false
    }

    async fn phase_started(&self, phase: Phase, tasks: usize) {
        info!("{} ({} tasks)", phase.label(), tasks);
        notify(&self.events, PipelineEvent::PhaseStarted { phase, tasks }).await;
    }

    async fn complete_phase(&self, job_id: &str, phase: Phase, progress: &mut u8) {
        notify(&self.events, PipelineEvent::PhaseCompleted { phase }).await;
        *progress = phase.checkpoint();
        self.checkpoint(job_id, *progress, RunStatus::Running).await;
    }

    async fn checkpoint(&self, job_id: &str, percent: u8, status: RunStatus) {
        for sink in &self.progress {
            sink.report(job_id, percent, status).await;
        }
        notify(&self.events, PipelineEvent::Progress { percent, status }).await;
    }
}
