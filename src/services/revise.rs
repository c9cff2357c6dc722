//! Corrections with a similarity gate, justifications and reference checks.

use std::sync::Arc;

use tracing::debug;

use super::references::{LinkProbe, ReferenceCheck};
use super::similarity::similarity;
use crate::llm::{prompts, InferenceGateway, TokenUsage};
use crate::models::{Category, RevisionKind, RevisionRecord};

/// Justification used when no justification call is made or it fails.
pub const FALLBACK_JUSTIFICATION: &str = "Correction applied.";

/// What happened to one unit in the revision phase.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionOutcome {
    pub kind: RevisionKind,
    /// Present only when the correction passed the similarity gate.
    pub record: Option<RevisionRecord>,
    pub correction_usage: TokenUsage,
    pub justification_usage: TokenUsage,
}

impl RevisionOutcome {
    pub fn corrected_text(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.corrected_text.as_str())
    }
}

#[derive(Clone)]
pub struct Reviser {
    gateway: InferenceGateway,
    textual_prompt: String,
    similarity_threshold: f64,
    justify: bool,
    probe: Option<Arc<dyn LinkProbe>>,
}

impl Reviser {
    pub fn new(gateway: InferenceGateway, textual_prompt: &str, similarity_threshold: f64) -> Self {
        Self {
            gateway,
            textual_prompt: textual_prompt.to_string(),
            similarity_threshold,
            justify: true,
            probe: None,
        }
    }

    /// Skip the justification call and use the fallback text.
    pub fn without_justification(mut self) -> Self {
        self.justify = false;
        self
    }

    /// Check DOI/ISBN/URL of accepted bibliographic corrections.
    pub fn with_probe(mut self, probe: Arc<dyn LinkProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Correction prompt family for a category, if it gets one.
    pub fn kind_for(category: Category) -> Option<RevisionKind> {
        match category {
            Category::Textual => Some(RevisionKind::Textual),
            Category::Bibliographic => Some(RevisionKind::Bibliographic),
            Category::Logical | Category::None => None,
        }
    }

    pub async fn revise(&self, origin: &str, text: &str, kind: RevisionKind) -> RevisionOutcome {
        let prompt = match kind {
            RevisionKind::Textual => self.textual_prompt.as_str(),
            RevisionKind::Bibliographic => prompts::BIBLIOGRAPHIC_CORRECTION_PROMPT,
        };
        let correction = self.gateway.call(prompt, text).await;

        let mut outcome = RevisionOutcome {
            kind,
            record: None,
            correction_usage: correction.usage,
            justification_usage: TokenUsage::default(),
        };

        let Some(corrected) = correction.answer() else {
            return outcome;
        };

        let ratio = similarity(text, corrected);
        if ratio >= self.similarity_threshold {
            debug!("{}: correction rejected (similarity {:.4})", origin, ratio);
            return outcome;
        }

        let justification = if self.justify {
            let user = prompts::JUSTIFICATION_PROMPT
                .replace("{original}", text)
                .replace("{corrected}", corrected);
            let answer = self.gateway.call("", &user).await;
            outcome.justification_usage = answer.usage;
            answer
                .answer()
                .map(str::to_string)
                .unwrap_or_else(|| FALLBACK_JUSTIFICATION.to_string())
        } else {
            FALLBACK_JUSTIFICATION.to_string()
        };

        let external_validation_notes = match (kind, &self.probe) {
            (RevisionKind::Bibliographic, Some(probe)) => {
                Some(ReferenceCheck::run(corrected, probe.as_ref()).await.notes())
            }
            _ => None,
        };

        outcome.record = Some(RevisionRecord {
            kind,
            origin: origin.to_string(),
            original_text: text.to_string(),
            corrected_text: corrected.to_string(),
            external_validation_notes,
            justification,
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedBackend;
    use crate::llm::{LlmError, RetryPolicy};
    use crate::services::references::tests::TableProbe;

    fn gateway(backend: &Arc<ScriptedBackend>) -> InferenceGateway {
        InferenceGateway::new(backend.clone(), RetryPolicy::immediate(1))
    }

    #[tokio::test]
    async fn test_identical_correction_rejected() {
        let backend = Arc::new(ScriptedBackend::echo());
        let reviser = Reviser::new(gateway(&backend), prompts::TEXTUAL_CORRECTION_PROMPT, 0.999);
        let outcome = reviser
            .revise("Paragraph 1", "The report is ready.", RevisionKind::Textual)
            .await;
        assert!(outcome.record.is_none());
        assert_eq!(outcome.correction_usage, ScriptedBackend::USAGE);
        assert!(outcome.justification_usage.is_zero());
        // No justification call for a rejected correction.
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_accepted_correction_is_justified() {
        let backend = Arc::new(ScriptedBackend::new(|request, _| {
            if request.system.is_empty() {
                Ok("Fixed subject-verb agreement.".to_string())
            } else {
                Ok("The data were collected.".to_string())
            }
        }));
        let reviser = Reviser::new(gateway(&backend), prompts::TEXTUAL_CORRECTION_PROMPT, 0.999);
        let outcome = reviser
            .revise("Paragraph 2", "The data was collected.", RevisionKind::Textual)
            .await;

        let record = outcome.record.expect("accepted");
        assert_eq!(record.corrected_text, "The data were collected.");
        assert_eq!(record.justification, "Fixed subject-verb agreement.");
        assert_eq!(record.origin, "Paragraph 2");
        assert!(record.external_validation_notes.is_none());
        assert_eq!(outcome.justification_usage, ScriptedBackend::USAGE);

        let calls = backend.calls();
        assert!(calls[1].user.contains("Original Text: \"The data was collected.\""));
        assert!(calls[1].user.contains("Corrected Text: \"The data were collected.\""));
    }

    #[tokio::test]
    async fn test_failed_justification_uses_fallback() {
        let backend = Arc::new(ScriptedBackend::new(|request, _| {
            if request.system.is_empty() {
                Err(LlmError::Api("HTTP 500".into()))
            } else {
                Ok("Better text.".to_string())
            }
        }));
        let reviser = Reviser::new(gateway(&backend), "custom prompt", 0.999);
        let outcome = reviser.revise("Paragraph 1", "Bad text", RevisionKind::Textual).await;
        assert_eq!(outcome.record.unwrap().justification, FALLBACK_JUSTIFICATION);
        assert_eq!(backend.calls()[0].system, "custom prompt");
    }

    #[tokio::test]
    async fn test_without_justification_makes_one_call() {
        let backend = Arc::new(ScriptedBackend::fixed("Fully different text"));
        let reviser = Reviser::new(gateway(&backend), "p", 0.999).without_justification();
        let outcome = reviser.revise("Paragraph 1", "abc", RevisionKind::Textual).await;
        assert_eq!(outcome.corrected_text(), Some("Fully different text"));
        assert_eq!(outcome.record.unwrap().justification, FALLBACK_JUSTIFICATION);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_correction_leaves_unit_alone() {
        let backend = Arc::new(ScriptedBackend::failing());
        let reviser = Reviser::new(gateway(&backend), "p", 0.999);
        let outcome = reviser.revise("Paragraph 1", "abc", RevisionKind::Textual).await;
        assert!(outcome.record.is_none());
        assert!(outcome.correction_usage.is_zero());
    }

    #[tokio::test]
    async fn test_bibliographic_gets_reference_notes() {
        let backend = Arc::new(ScriptedBackend::new(|request, _| {
            if request.system.is_empty() {
                Ok("Standardized.".to_string())
            } else {
                Ok("SILVA, J. Title. 2020. DOI 10.1000/xyz".to_string())
            }
        }));
        let probe = Arc::new(TableProbe::new(&[("https://doi.org/10.1000/xyz", 200)]));
        let reviser = Reviser::new(gateway(&backend), "p", 0.999).with_probe(probe);
        let outcome = reviser
            .revise("Paragraph 9", "silva j title 2020", RevisionKind::Bibliographic)
            .await;

        assert_eq!(backend.calls()[0].system, prompts::BIBLIOGRAPHIC_CORRECTION_PROMPT);
        let record = outcome.record.unwrap();
        assert_eq!(record.kind, RevisionKind::Bibliographic);
        assert_eq!(
            record.external_validation_notes.as_deref(),
            Some("DOI valid | ISBN not found | URL broken/not found")
        );
    }

    #[test]
    fn test_kind_for() {
        assert_eq!(Reviser::kind_for(Category::Textual), Some(RevisionKind::Textual));
        assert_eq!(Reviser::kind_for(Category::Bibliographic), Some(RevisionKind::Bibliographic));
        assert_eq!(Reviser::kind_for(Category::Logical), None);
        assert_eq!(Reviser::kind_for(Category::None), None);
    }
}
