//! Default prompts for document revision.
//!
//! Placeholders are substituted with `str::replace`: `{original}`,
//! `{corrected}`, `{text}`, `{caption}`, `{dossier}`.

/// Full classifier: one of four labels.
pub const CLASSIFY_PROMPT: &str = r#"You are a text classifier. Analyze the excerpt and return ONLY ONE of the following categories based on its most evident error: 'textual' (grammar, spelling, agreement, punctuation), 'bibliographic' (references, citations, bibliography entries), 'logical' (clarity, cohesion, flow), or 'none' if there are no errors. If the excerpt is a title, a table of contents entry or a caption, return 'none'."#;

/// Lightweight classifier: textual or nothing.
pub const CLASSIFY_BINARY_PROMPT: &str = r#"Analyze the following paragraph. If it contains grammar, spelling, punctuation or agreement errors, answer ONLY with the word 'textual'. Otherwise answer ONLY with 'none'."#;

pub const TEXTUAL_CORRECTION_PROMPT: &str = r#"You are a reviser of academic and technical texts and an expert in the formal standard of the text's language. Correct the excerpt below with maximum rigor, focusing on grammar, spelling, verbal and nominal agreement, government, and punctuation. Do NOT change the writing style, the author's voice or the technical terminology. If the text is already correct, repeat it in full. Answer ONLY with the corrected text."#;

pub const BIBLIOGRAPHIC_CORRECTION_PROMPT: &str = r#"You are an expert in bibliographic reference standards (ABNT NBR 6023). Review and standardize the bibliographic reference below. Answer ONLY with the corrected reference."#;

pub const JUSTIFICATION_PROMPT: &str = r#"You are a reviser. Compare the 'Original Text' with the 'Corrected Text' and explain concisely and technically, in a single sentence, the main correction applied.

Original Text: "{original}"
Corrected Text: "{corrected}""#;

pub const CRITICAL_ANALYSIS_PROMPT: &str = r#"Act as a critical and logical analyst. Read the excerpt below and: 1. Concisely extract the factual claims and key data. 2. Explicitly point out ANY logical inconsistency, contradiction, impossible value (e.g. '101%'), or logical leap where a conclusion does not clearly follow from its premises. If there is nothing to report, answer 'N/A'.

Excerpt: "{text}""#;

pub const IMAGE_DESCRIPTION_PROMPT: &str = r#"Provide an objective and concise description of the main elements in the image. Use the supplied caption only as context. Do NOT include any prefix such as 'Figure X:'. Answer ONLY with the description of the visual content.

Caption for context: '{caption}'"#;

pub const GLOBAL_ANALYSIS_PROMPT: &str = r#"You are a logical analyst. The dossier below contains a list of facts, data and descriptions extracted from a document, including automatic validations. Find and list ALL logical or factual contradictions between the items of this list. If, and only if, the list of contradictions is empty, answer with the exact sentence 'No global inconsistencies were found.'.

Dossier for analysis:

{dossier}"#;

/// Exact answer the global analysis prompt asks for when nothing is wrong.
pub const NO_GLOBAL_INCONSISTENCIES: &str = "No global inconsistencies were found.";

/// Per-unit analysis answer meaning "nothing to report".
pub const NOT_APPLICABLE: &str = "N/A";
