//! Run report: JSON rows and a markdown technical report.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cost::{CostRow, TOTAL};
use super::error::PipelineError;
use super::phase::RunMode;
use crate::models::{CitationGap, RevisionRecord, ValidationFinding};

pub const REPORT_JSON: &str = "report.json";
pub const REPORT_MARKDOWN: &str = "report.md";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub job_id: String,
    pub document: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub units: usize,
    pub revisions: Vec<RevisionRecord>,
    pub findings: Vec<ValidationFinding>,
    pub citation_gaps: Vec<CitationGap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_analysis: Option<String>,
    pub costs: Vec<CostRow>,
    pub currency: String,
}

/// Where a finished run wrote its outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub document: PathBuf,
    pub json: PathBuf,
    pub markdown: PathBuf,
}

impl RunReport {
    pub fn total(&self) -> Option<&CostRow> {
        self.costs.iter().rev().find(|row| row.phase == TOTAL)
    }

    /// Write `report.json` and `report.md` into `dir`.
    pub async fn write(&self, dir: &Path) -> Result<(PathBuf, PathBuf), PipelineError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| PipelineError::Output {
                path: dir.to_path_buf(),
                source,
            })?;

        let json_path = dir.join(REPORT_JSON);
        let json = serde_json::to_vec_pretty(self)?;
        write_file(&json_path, &json).await?;

        let markdown_path = dir.join(REPORT_MARKDOWN);
        write_file(&markdown_path, self.to_markdown().as_bytes()).await?;

        Ok((json_path, markdown_path))
    }

    pub async fn read(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# Technical Review Report\n");
        let _ = writeln!(out, "- Document: `{}`", self.document);
        let _ = writeln!(out, "- Job: `{}`", self.job_id);
        let _ = writeln!(out, "- Mode: {}", self.mode);
        let _ = writeln!(out, "- Started: {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "- Duration: {:.1}s", self.duration_secs);
        let _ = writeln!(out, "- Units analyzed: {}", self.units);

        let _ = writeln!(out, "\n## Revisions\n");
        if self.revisions.is_empty() {
            let _ = writeln!(out, "No corrections were applied.");
        } else {
            let _ = writeln!(out, "| Type | Origin | Original | Corrected | Notes | Justification |");
            let _ = writeln!(out, "|---|---|---|---|---|---|");
            for r in &self.revisions {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} |",
                    r.kind.as_str(),
                    cell(&r.origin),
                    cell(&r.original_text),
                    cell(&r.corrected_text),
                    cell(r.external_validation_notes.as_deref().unwrap_or("-")),
                    cell(&r.justification),
                );
            }
        }

        let _ = writeln!(out, "\n## Validation Findings\n");
        if self.findings.is_empty() {
            let _ = writeln!(out, "No rule violations were found.");
        } else {
            let _ = writeln!(out, "| Origin | Rule | Affected text | Detail | Severity |");
            let _ = writeln!(out, "|---|---|---|---|---|");
            for f in &self.findings {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    cell(&f.origin),
                    f.rule,
                    cell(&f.affected_text),
                    cell(&f.detail),
                    f.severity,
                );
            }
        }

        let _ = writeln!(out, "\n## Citation Gaps\n");
        if self.citation_gaps.is_empty() {
            let _ = writeln!(out, "Every citation has a matching reference.");
        } else {
            for gap in &self.citation_gaps {
                let _ = writeln!(out, "- {}", gap);
            }
        }

        if let Some(global) = &self.global_analysis {
            let _ = writeln!(out, "\n## Global Analysis\n");
            let _ = writeln!(out, "{}", global.trim());
        }

        let _ = writeln!(out, "\n## Costs\n");
        let _ = writeln!(out, "| Phase | Tokens in | Tokens out | USD | {} |", self.currency);
        let _ = writeln!(out, "|---|---|---|---|---|");
        for row in &self.costs {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {:.4} | {:.2} |",
                row.phase, row.tokens_in, row.tokens_out, row.cost_usd, row.cost_local
            );
        }

        out
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| PipelineError::Output {
            path: path.to_path_buf(),
            source,
        })
}

/// Escape a value for a markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RevisionKind, Rule, Severity};
    use tempfile::tempdir;

    fn sample() -> RunReport {
        RunReport {
            job_id: "job-7".into(),
            document: "thesis.json".into(),
            mode: RunMode::Full,
            started_at: Utc::now(),
            duration_secs: 12.5,
            units: 3,
            revisions: vec![RevisionRecord {
                kind: RevisionKind::Textual,
                origin: "Paragraph 1".into(),
                original_text: "a | b".into(),
                corrected_text: "a or b".into(),
                external_validation_notes: None,
                justification: "Replaced the pipe.".into(),
            }],
            findings: vec![ValidationFinding::new(
                Rule::ImpossiblePercentage,
                "150%",
                "Percentage 150% exceeds 100%",
                Severity::High,
            )
            .with_origin("Paragraph 2")],
            citation_gaps: vec![CitationGap {
                author: "SILVA".into(),
                year: "2020".into(),
            }],
            global_analysis: Some("No global inconsistencies were found.".into()),
            costs: vec![CostRow {
                phase: TOTAL.into(),
                tokens_in: 10,
                tokens_out: 5,
                cost_usd: 0.0001,
                cost_local: 0.0,
            }],
            currency: "BRL".into(),
        }
    }

    #[test]
    fn test_markdown_sections() {
        let md = sample().to_markdown();
        assert!(md.contains("## Revisions"));
        assert!(md.contains("| textual | Paragraph 1 | a \\| b | a or b | - | Replaced the pipe. |"));
        assert!(md.contains("| Paragraph 2 | impossible_percentage | 150% | Percentage 150% exceeds 100% | high |"));
        assert!(md.contains("- (SILVA, 2020)"));
        assert!(md.contains("## Global Analysis"));
        assert!(md.contains("| total | 10 | 5 | 0.0001 | 0.00 |"));
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let report = sample();
        let (json, markdown) = report.write(&dir.path().join("out")).await.unwrap();
        assert!(markdown.exists());

        let loaded = RunReport::read(&json).await.unwrap();
        assert_eq!(loaded.job_id, "job-7");
        assert_eq!(loaded.findings, report.findings);
        assert_eq!(loaded.total().map(|r| r.tokens_in), Some(10));
    }
}
