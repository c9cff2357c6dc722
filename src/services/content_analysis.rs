//! Per-unit critical analysis and image description.

use tracing::debug;

use crate::llm::{prompts, ImageInput, InferenceGateway, TokenUsage};
use crate::models::{ContentUnit, UnitKind};

/// Analysis text for one unit. `text` is `None` when there is nothing to
/// report or the call failed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitAnalysis {
    pub origin: String,
    pub text: Option<String>,
    pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct ContentAnalyzer {
    gateway: InferenceGateway,
}

impl ContentAnalyzer {
    pub fn new(gateway: InferenceGateway) -> Self {
        Self { gateway }
    }

    /// Critical analysis for text units, a description for images.
    /// Other kinds are not analyzed.
    pub async fn analyze(&self, unit: &ContentUnit) -> UnitAnalysis {
        let outcome = match unit.kind {
            UnitKind::Text | UnitKind::TableCell => {
                let user = prompts::CRITICAL_ANALYSIS_PROMPT.replace("{text}", unit.effective_text());
                self.gateway.call("", &user).await
            }
            UnitKind::Image => match &unit.image_blob {
                Some(blob) => {
                    let prompt = prompts::IMAGE_DESCRIPTION_PROMPT
                        .replace("{caption}", unit.caption.as_deref().unwrap_or_default());
                    let image = ImageInput {
                        mime_type: unit
                            .image_mime
                            .clone()
                            .unwrap_or_else(|| "image/png".to_string()),
                        data: blob.clone(),
                    };
                    self.gateway.describe_image(&prompt, image).await
                }
                None => Default::default(),
            },
            UnitKind::TableObject => Default::default(),
        };

        let text = outcome
            .answer()
            .filter(|answer| !answer.eq_ignore_ascii_case(prompts::NOT_APPLICABLE))
            .map(str::to_string);
        if text.is_none() {
            debug!("{}: nothing to report", unit.origin);
        }

        UnitAnalysis {
            origin: unit.origin.clone(),
            text,
            usage: outcome.usage,
        }
    }
}
