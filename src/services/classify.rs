//! Error-category classification of text units.

use crate::llm::{prompts, InferenceGateway, TokenUsage};
use crate::models::Category;

/// Which label set the classifier asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSet {
    /// textual / bibliographic / logical / none
    Full,
    /// textual / none
    Binary,
}

impl LabelSet {
    fn prompt(&self) -> &'static str {
        match self {
            LabelSet::Full => prompts::CLASSIFY_PROMPT,
            LabelSet::Binary => prompts::CLASSIFY_BINARY_PROMPT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct Classifier {
    gateway: InferenceGateway,
    labels: LabelSet,
}

impl Classifier {
    pub fn new(gateway: InferenceGateway, labels: LabelSet) -> Self {
        Self { gateway, labels }
    }

    /// Classify one text. Failed or unrecognized answers map to `Category::None`.
    pub async fn classify(&self, text: &str) -> Classification {
        let outcome = self.gateway.call(self.labels.prompt(), text).await;

        let category = match outcome.answer() {
            None => Category::None,
            Some(answer) => match self.labels {
                LabelSet::Full => Category::parse_label(answer),
                LabelSet::Binary if answer.to_lowercase().contains("textual") => Category::Textual,
                LabelSet::Binary => Category::None,
            },
        };

        Classification {
            category,
            usage: outcome.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedBackend;
    use crate::llm::RetryPolicy;
    use std::sync::Arc;

    fn classifier(backend: ScriptedBackend, labels: LabelSet) -> (Classifier, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let gateway = InferenceGateway::new(backend.clone(), RetryPolicy::immediate(2));
        (Classifier::new(gateway, labels), backend)
    }

    #[tokio::test]
    async fn test_full_labels() {
        let (classifier, backend) = classifier(ScriptedBackend::fixed("Bibliographic"), LabelSet::Full);
        let result = classifier.classify("SILVA, J. Livro. 2020").await;
        assert_eq!(result.category, Category::Bibliographic);
        assert_eq!(result.usage, ScriptedBackend::USAGE);
        assert_eq!(backend.calls()[0].system, prompts::CLASSIFY_PROMPT);
        assert_eq!(backend.calls()[0].user, "SILVA, J. Livro. 2020");
    }

    #[tokio::test]
    async fn test_binary_labels_collapse_to_textual_or_none() {
        let (classifier, backend) = classifier(ScriptedBackend::fixed("bibliographic"), LabelSet::Binary);
        assert_eq!(classifier.classify("x").await.category, Category::None);
        assert_eq!(backend.calls()[0].system, prompts::CLASSIFY_BINARY_PROMPT);

        let (classifier, _) = classifier_textual();
        assert_eq!(classifier.classify("x").await.category, Category::Textual);
    }

    fn classifier_textual() -> (Classifier, Arc<ScriptedBackend>) {
        classifier(ScriptedBackend::fixed("'Textual'."), LabelSet::Binary)
    }

    #[tokio::test]
    async fn test_failure_is_none_with_zero_usage() {
        let (classifier, backend) = classifier(ScriptedBackend::failing(), LabelSet::Full);
        let result = classifier.classify("x").await;
        assert_eq!(result.category, Category::None);
        assert!(result.usage.is_zero());
        assert_eq!(backend.call_count(), 2);
    }
}
