//! End-to-end Pipeline Tests
//!
//! Runs the orchestrator against JSON documents on disk with a scripted
//! inference backend, an in-memory link probe and recording progress sinks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use revisor::config::Config;
use revisor::document::Document;
use revisor::llm::mock::ScriptedBackend;
use revisor::llm::{prompts, InferenceGateway, InferenceRequest, LlmError, RetryPolicy};
use revisor::models::{RevisionKind, Rule};
use revisor::pipeline::{
    CancellationSource, MemoryCancellation, Phase, PipelineEvent, PipelineOrchestrator,
    RecordingProgress, RunMode, RunOutcome, RunRequest, RunStatus,
};
use revisor::services::LinkProbe;

const CORRECTED_REFERENCE: &str =
    "SOUZA, M. Métodos de pesquisa. Rio de Janeiro: Atlas, 2019. ISBN 978-85-97-02135-6.";
const GLOBAL_REPORT: &str = "The 120% adhesion rate contradicts the table totals.";

/// Every URL answers 404.
struct OfflineProbe;

#[async_trait]
impl LinkProbe for OfflineProbe {
    async fn head_status(&self, _url: &str) -> Option<u16> {
        Some(404)
    }
}

fn sample_document() -> &'static str {
    r#"{
        "paragraphs": [
            {"text": "Os dados foi coletados em campo durante a pesquisa."},
            {"text": "A taxa de adesão chegou a 120% segundo (Silva, 2020) e (Souza, 2019)."},
            {"text": "SOUZA, M. Métodos. Rio de Janeiro, 2019."},
            {"text": "", "images": [{"id": "chart", "data": "iVBORw0KGgo="}]},
            {"text": "Figure 1 - Adhesion chart"}
        ],
        "tables": [
            {"rows": [
                {"cells": [{"paragraphs": [{"text": "Item"}]}, {"paragraphs": [{"text": "Planned"}]}, {"paragraphs": [{"text": "Executed"}]}, {"paragraphs": [{"text": "Difference"}]}]},
                {"cells": [{"paragraphs": [{"text": "A"}]}, {"paragraphs": [{"text": "10"}]}, {"paragraphs": [{"text": "15"}]}, {"paragraphs": [{"text": "5"}]}]},
                {"cells": [{"paragraphs": [{"text": "B"}]}, {"paragraphs": [{"text": "20"}]}, {"paragraphs": [{"text": "25"}]}, {"paragraphs": [{"text": "4"}]}]},
                {"cells": [{"paragraphs": [{"text": "Total"}]}, {"paragraphs": [{"text": "30"}]}, {"paragraphs": [{"text": "40"}]}, {"paragraphs": [{"text": "9"}]}]}
            ]}
        ]
    }"#
}

fn write_document(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, json).unwrap();
    path
}

fn is_classification(request: &InferenceRequest) -> bool {
    request.system == prompts::CLASSIFY_PROMPT || request.system == prompts::CLASSIFY_BINARY_PROMPT
}

/// Answers by prompt: classifications, corrections, justifications, unit
/// analyses, image descriptions and the global report.
fn respond(request: &InferenceRequest, _index: usize) -> Result<String, LlmError> {
    let user = request.user.as_str();

    let answer = if request.image.is_some() {
        "A bar chart comparing planned and executed adhesion."
    } else if is_classification(request) {
        if user.contains(" foi ") {
            "textual"
        } else if user.starts_with("SOUZA") {
            "bibliographic"
        } else {
            "none"
        }
    } else if request.system == prompts::TEXTUAL_CORRECTION_PROMPT {
        return Ok(user.replace(" foi ", " foram "));
    } else if request.system == prompts::BIBLIOGRAPHIC_CORRECTION_PROMPT {
        CORRECTED_REFERENCE
    } else if user.contains("Dossier for analysis") {
        GLOBAL_REPORT
    } else if user.starts_with("You are a reviser") {
        "Fixed subject-verb agreement."
    } else if user.contains("120%") {
        "Claims an adhesion rate of 120%, which is impossible."
    } else {
        prompts::NOT_APPLICABLE
    };
    Ok(answer.to_string())
}

fn gateway(backend: &Arc<ScriptedBackend>) -> InferenceGateway {
    InferenceGateway::new(backend.clone(), RetryPolicy::immediate(2))
}

#[tokio::test]
async fn test_full_run_produces_revisions_findings_and_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(dir.path(), "thesis.json", sample_document());
    let output = dir.path().join("out");

    let backend = Arc::new(ScriptedBackend::new(respond));
    let progress = Arc::new(RecordingProgress::new());
    let orchestrator = PipelineOrchestrator::new(&Config::default(), gateway(&backend))
        .with_probe(Arc::new(OfflineProbe))
        .with_progress(progress.clone());

    let request = RunRequest::new(&document, RunMode::Full, &output).with_job_id("job-full");
    let outcome = orchestrator.run(request).await;

    let RunOutcome::Completed { report, artifacts } = outcome else {
        panic!("expected a completed run, got {:?}", outcome.status());
    };

    // Revisions in unit order: the textual paragraph, then the reference.
    assert_eq!(report.revisions.len(), 2);
    let textual = &report.revisions[0];
    assert_eq!(textual.kind, RevisionKind::Textual);
    assert_eq!(textual.origin, "Paragraph 1");
    assert_eq!(
        textual.corrected_text,
        "Os dados foram coletados em campo durante a pesquisa."
    );
    assert_eq!(textual.justification, "Fixed subject-verb agreement.");

    let reference = &report.revisions[1];
    assert_eq!(reference.kind, RevisionKind::Bibliographic);
    assert_eq!(reference.origin, "Paragraph 3");
    assert_eq!(reference.corrected_text, CORRECTED_REFERENCE);
    let notes = reference.external_validation_notes.as_deref().unwrap();
    assert!(notes.contains("ISBN found"));

    // Findings in unit order: body paragraph first, then the table object.
    assert_eq!(report.findings.len(), 2);
    assert_eq!(report.findings[0].rule, Rule::ImpossiblePercentage);
    assert_eq!(report.findings[0].origin, "Paragraph 2");
    assert_eq!(report.findings[1].rule, Rule::DifferenceMismatch);
    assert_eq!(report.findings[1].origin, "Table 1");
    assert_eq!(report.findings[1].affected_text, "row 3");

    // Souza 2019 is covered by the corrected reference; Silva 2020 is not.
    assert_eq!(report.citation_gaps.len(), 1);
    assert_eq!(report.citation_gaps[0].author, "SILVA");
    assert_eq!(report.citation_gaps[0].year, "2020");

    assert_eq!(report.global_analysis.as_deref(), Some(GLOBAL_REPORT));

    // The global call sees automatic findings and the image description.
    let calls = backend.calls();
    let global = calls
        .iter()
        .find(|c| c.user.contains("Dossier for analysis"))
        .unwrap();
    assert!(global
        .user
        .contains("- Origin (Table 1): [AUTOMATIC VALIDATION]"));
    assert!(global.user.contains("Percentage 120% exceeds 100%"));
    assert!(global
        .user
        .contains("- Origin (Figure 1 - Adhesion chart): A bar chart"));
    assert_eq!(
        calls
            .iter()
            .filter(|c| c.user.contains("Dossier for analysis"))
            .count(),
        1
    );

    // Artifacts on disk, with the correction written back.
    assert_eq!(artifacts.dir, output.join("thesis"));
    assert!(artifacts.json.exists());
    assert!(artifacts.markdown.exists());
    let revised = Document::open(&artifacts.document).await.unwrap();
    assert_eq!(
        revised.paragraphs[0].text,
        "Os dados foram coletados em campo durante a pesquisa."
    );
    assert_eq!(revised.paragraphs[2].text, CORRECTED_REFERENCE);
    assert_eq!(
        revised.paragraphs[1].text,
        "A taxa de adesão chegou a 120% segundo (Silva, 2020) e (Souza, 2019)."
    );

    // Cost table carries every phase that spent tokens, plus a total.
    let phases: Vec<&str> = report.costs.iter().map(|r| r.phase.as_str()).collect();
    for phase in [
        "classification",
        "textual_revision",
        "bibliographic_revision",
        "justification",
        "content_analysis",
        "global_analysis",
        "total",
    ] {
        assert!(phases.contains(&phase), "missing cost row {}", phase);
    }

    let reports = progress.reports();
    let percents: Vec<u8> = reports.iter().map(|(percent, _)| *percent).collect();
    assert_eq!(percents, vec![5, 15, 30, 60, 75, 80, 88, 90, 95, 100]);
    assert_eq!(progress.last(), Some((100, RunStatus::Completed)));
}

#[tokio::test]
async fn test_cancel_before_revising_stops_at_classification_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(dir.path(), "thesis.json", sample_document());

    let cancellation = Arc::new(MemoryCancellation::new());
    let signal = cancellation.clone();
    // The cancel request arrives while classification is in flight; the
    // watcher polls too rarely to see it, so the check before Revising does.
    let backend = Arc::new(ScriptedBackend::new(move |request, index| {
        if index == 0 {
            signal.request("job-cancel");
        }
        respond(request, index)
    }));
    let mut config = Config::default();
    config.pipeline.cancel_poll_ms = 60_000;
    let progress = Arc::new(RecordingProgress::new());
    let orchestrator = PipelineOrchestrator::new(&config, gateway(&backend))
        .with_cancellation(cancellation.clone())
        .with_progress(progress.clone());

    let request = RunRequest::new(&document, RunMode::Full, dir.path().join("out"))
        .with_job_id("job-cancel");
    let artifact_dir = request.artifact_dir();
    let outcome = orchestrator.run(request).await;

    match outcome {
        RunOutcome::Cancelled { phase, progress } => {
            assert_eq!(phase, Phase::Revising);
            assert_eq!(progress, 30);
        }
        other => panic!("expected cancellation, got {:?}", other.status()),
    }

    // No work past classification, and no outputs.
    assert!(backend.calls().iter().all(is_classification));
    assert!(!artifact_dir.exists());

    // The signal was consumed exactly once.
    assert!(!cancellation.is_pending("job-cancel"));
    assert!(!cancellation.take("job-cancel").await);

    assert_eq!(
        progress.last(),
        Some((30, RunStatus::Cancelled))
    );
}

#[tokio::test]
async fn test_cancel_during_classification_does_not_complete_the_phase() {
    let dir = tempfile::tempdir().unwrap();
    let paragraphs: Vec<String> = (1..=20)
        .map(|i| format!(r#"{{"text": "Paragraph number {} carries enough text."}}"#, i))
        .collect();
    let document = write_document(
        dir.path(),
        "long.json",
        &format!(r#"{{"paragraphs": [{}]}}"#, paragraphs.join(",")),
    );

    let cancellation = Arc::new(MemoryCancellation::new());
    let signal = cancellation.clone();
    let backend = Arc::new(
        ScriptedBackend::new(move |request, index| {
            if index == 0 {
                signal.request("job-mid");
            }
            respond(request, index)
        })
        .with_delay(Duration::from_millis(100)),
    );

    let mut config = Config::default();
    config.pipeline.cancel_poll_ms = 10;
    let progress = Arc::new(RecordingProgress::new());
    let (tx, mut rx) = mpsc::channel(64);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });
    let orchestrator = PipelineOrchestrator::new(&config, gateway(&backend))
        .with_cancellation(cancellation.clone())
        .with_progress(progress.clone())
        .with_events(tx);

    let outcome = orchestrator
        .run(RunRequest::new(&document, RunMode::Full, dir.path().join("out")).with_job_id("job-mid"))
        .await;
    drop(orchestrator);
    let events = collector.await.unwrap();

    match outcome {
        RunOutcome::Cancelled { phase, progress } => {
            assert_eq!(phase, Phase::Classifying);
            assert_eq!(progress, 15);
        }
        other => panic!("expected cancellation, got {:?}", other.status()),
    }

    // The watcher stopped submission after the first batch of workers.
    assert!(backend.call_count() < 20);
    assert!(backend.calls().iter().all(is_classification));
    assert!(!events
        .iter()
        .any(|e| matches!(e, PipelineEvent::PhaseCompleted { phase: Phase::Classifying })));
    assert!(!cancellation.is_pending("job-mid"));

    let percents: Vec<u8> = progress.reports().iter().map(|(p, _)| *p).collect();
    assert_eq!(percents, vec![5, 15, 15]);
    assert_eq!(progress.last(), Some((15, RunStatus::Cancelled)));
}

#[tokio::test]
async fn test_cancel_before_start_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(dir.path(), "thesis.json", sample_document());

    let cancellation = Arc::new(MemoryCancellation::new());
    cancellation.request("job-early");
    let backend = Arc::new(ScriptedBackend::new(respond));
    let orchestrator = PipelineOrchestrator::new(&Config::default(), gateway(&backend))
        .with_cancellation(cancellation.clone());

    let request =
        RunRequest::new(&document, RunMode::Full, dir.path().join("out")).with_job_id("job-early");
    let outcome = orchestrator.run(request).await;

    assert!(matches!(
        outcome,
        RunOutcome::Cancelled {
            phase: Phase::Mapping,
            progress: 5
        }
    ));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_missing_document_fails_with_final_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(ScriptedBackend::new(respond));
    let progress = Arc::new(RecordingProgress::new());
    let orchestrator = PipelineOrchestrator::new(&Config::default(), gateway(&backend))
        .with_progress(progress.clone());

    let request = RunRequest::new(dir.path().join("absent.json"), RunMode::Full, dir.path())
        .with_job_id("job-missing");
    let outcome = orchestrator.run(request).await;

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(backend.call_count(), 0);
    assert_eq!(
        progress.last(),
        Some((100, RunStatus::Failed))
    );
}

#[tokio::test]
async fn test_invalid_document_fails() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(dir.path(), "broken.json", "{ not json");
    let backend = Arc::new(ScriptedBackend::new(respond));
    let orchestrator = PipelineOrchestrator::new(&Config::default(), gateway(&backend));

    let outcome = orchestrator
        .run(RunRequest::new(&document, RunMode::Consistency, dir.path()))
        .await;

    let RunOutcome::Failed { error } = outcome else {
        panic!("expected failure");
    };
    assert!(!error.to_string().is_empty());
}

#[tokio::test]
async fn test_consistency_run_with_empty_dossier_skips_global_call() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(
        dir.path(),
        "memo.json",
        r#"{"paragraphs": [{"text": "Short text."}, {"text": "All good."}]}"#,
    );
    let backend = Arc::new(ScriptedBackend::new(respond));
    let orchestrator = PipelineOrchestrator::new(&Config::default(), gateway(&backend));

    let outcome = orchestrator
        .run(RunRequest::new(&document, RunMode::Consistency, dir.path().join("out")))
        .await;

    let RunOutcome::Completed { report, .. } = outcome else {
        panic!("expected a completed run");
    };
    // Both paragraphs are short enough to skip per-unit analysis.
    assert_eq!(backend.call_count(), 0);
    assert!(report.findings.is_empty());
    assert!(report.revisions.is_empty());
    assert_eq!(
        report.global_analysis.as_deref(),
        Some("Nothing relevant for global analysis.")
    );
}

#[tokio::test]
async fn test_textual_run_only_corrects_language() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(dir.path(), "thesis.json", sample_document());
    let backend = Arc::new(ScriptedBackend::new(respond));
    let orchestrator = PipelineOrchestrator::new(&Config::default(), gateway(&backend))
        .with_probe(Arc::new(OfflineProbe));

    let outcome = orchestrator
        .run(RunRequest::new(&document, RunMode::Textual, dir.path().join("out")))
        .await;

    let RunOutcome::Completed { report, .. } = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.revisions.len(), 1);
    assert_eq!(report.revisions[0].kind, RevisionKind::Textual);
    assert_eq!(report.revisions[0].justification, "Correction applied.");

    // No rule validation, cross-check, analysis or global call in this mode.
    assert!(report.findings.is_empty());
    assert!(report.citation_gaps.is_empty());
    assert!(report.global_analysis.is_none());

    let calls = backend.calls();
    assert!(calls
        .iter()
        .filter(|c| c.system.is_empty())
        .all(|c| !c.user.starts_with("You are a reviser")));
    assert!(calls
        .iter()
        .filter(|c| is_classification(c))
        .all(|c| c.system == prompts::CLASSIFY_BINARY_PROMPT));
    assert!(calls.iter().all(|c| c.image.is_none()));
}

#[tokio::test]
async fn test_textual_run_revises_caption_paragraphs() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(
        dir.path(),
        "figures.json",
        r#"{"paragraphs": [
            {"text": "", "images": [{"id": "chart", "data": "iVBORw0KGgo="}]},
            {"text": "Figure 1 - Os valores foi medidos em campo"}
        ]}"#,
    );
    let backend = Arc::new(ScriptedBackend::new(respond));
    let orchestrator = PipelineOrchestrator::new(&Config::default(), gateway(&backend));

    let outcome = orchestrator
        .run(RunRequest::new(&document, RunMode::Textual, dir.path().join("out")))
        .await;

    let RunOutcome::Completed { report, artifacts } = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.revisions.len(), 1);
    assert_eq!(report.revisions[0].origin, "Paragraph 2");
    let revised = Document::open(&artifacts.document).await.unwrap();
    assert_eq!(
        revised.paragraphs[1].text,
        "Figure 1 - Os valores foram medidos em campo"
    );
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(dir.path(), "thesis.json", sample_document());
    let backend = Arc::new(ScriptedBackend::new(respond));

    let (tx, mut rx) = mpsc::channel(16);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });

    let orchestrator =
        PipelineOrchestrator::new(&Config::default(), gateway(&backend)).with_events(tx);
    let outcome = orchestrator
        .run(RunRequest::new(&document, RunMode::Textual, dir.path().join("out")))
        .await;
    assert_eq!(outcome.status(), RunStatus::Completed);
    drop(orchestrator);

    let events = collector.await.unwrap();
    assert!(matches!(
        events.first(),
        Some(PipelineEvent::Started {
            mode: RunMode::Textual,
            ..
        })
    ));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Completed { revisions: 1, .. })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::PhaseCompleted { phase: Phase::Revising })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, PipelineEvent::PhaseStarted { phase: Phase::Aggregating, .. })));
}
