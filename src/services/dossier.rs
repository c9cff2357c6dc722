//! Dossier aggregation and the global consistency pass.
//!
//! Rule findings and per-unit analyses are flattened into one list of
//! origin-tagged lines. A single inference call then looks for
//! contradictions across the whole list.

use tracing::{info, warn};

use crate::llm::{prompts, InferenceGateway, TokenUsage};
use crate::models::ValidationFinding;

/// Text reported when the dossier is empty.
pub const NOTHING_TO_ANALYZE: &str = "Nothing relevant for global analysis.";

/// Text reported when the global call fails.
pub const ANALYSIS_UNAVAILABLE: &str = "Global analysis unavailable: inference failed.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DossierEntry {
    pub origin: String,
    pub text: String,
    pub automatic: bool,
}

impl DossierEntry {
    fn render(&self) -> String {
        if self.automatic {
            format!("- Origin ({}): [AUTOMATIC VALIDATION] {}", self.origin, self.text)
        } else {
            format!("- Origin ({}): {}", self.origin, self.text)
        }
    }
}

/// Ordered, origin-tagged evidence for the global pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dossier {
    entries: Vec<DossierEntry>,
}

impl Dossier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_finding(&mut self, finding: &ValidationFinding) {
        self.entries.push(DossierEntry {
            origin: finding.origin.clone(),
            text: finding.detail.clone(),
            automatic: true,
        });
    }

    /// Add an analysis result. Blank and "N/A" results are ignored.
    pub fn push_analysis(&mut self, origin: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case(prompts::NOT_APPLICABLE) {
            return;
        }
        self.entries.push(DossierEntry {
            origin: origin.to_string(),
            text: text.to_string(),
            automatic: false,
        });
    }

    pub fn entries(&self) -> &[DossierEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(DossierEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of the global consistency pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalAnalysis {
    NothingToAnalyze,
    Report(String),
    Unavailable,
}

impl GlobalAnalysis {
    pub fn text(&self) -> &str {
        match self {
            GlobalAnalysis::NothingToAnalyze => NOTHING_TO_ANALYZE,
            GlobalAnalysis::Report(text) => text,
            GlobalAnalysis::Unavailable => ANALYSIS_UNAVAILABLE,
        }
    }

    /// True when the analysis ran and found no contradictions.
    pub fn is_clean(&self) -> bool {
        match self {
            GlobalAnalysis::NothingToAnalyze => true,
            GlobalAnalysis::Report(text) => text.trim() == prompts::NO_GLOBAL_INCONSISTENCIES,
            GlobalAnalysis::Unavailable => false,
        }
    }
}

pub struct GlobalConsistencyAnalyzer {
    gateway: InferenceGateway,
    prompt_template: String,
}

impl GlobalConsistencyAnalyzer {
    /// `prompt_template` must contain `{dossier}`.
    pub fn new(gateway: InferenceGateway, prompt_template: &str) -> Self {
        Self {
            gateway,
            prompt_template: prompt_template.to_string(),
        }
    }

    /// Consume the dossier. An empty dossier makes no inference call.
    pub async fn analyze(&self, dossier: Dossier) -> (GlobalAnalysis, TokenUsage) {
        if dossier.is_empty() {
            info!("Dossier is empty, skipping global analysis");
            return (GlobalAnalysis::NothingToAnalyze, TokenUsage::default());
        }

        info!("Running global analysis over {} dossier entries", dossier.len());
        let user = self.prompt_template.replace("{dossier}", &dossier.render());
        let outcome = self.gateway.call("", &user).await;

        let analysis = match outcome.answer() {
            Some(text) => GlobalAnalysis::Report(text.to_string()),
            None => {
                warn!("Global analysis failed after all attempts");
                GlobalAnalysis::Unavailable
            }
        };
        (analysis, outcome.usage)
    }
}
