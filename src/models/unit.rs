//! Content units: the addressable pieces a document is decomposed into.

use serde::{Deserialize, Serialize};

/// What kind of content a unit carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Text,
    Image,
    TableCell,
    TableObject,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Text => "text",
            UnitKind::Image => "image",
            UnitKind::TableCell => "table_cell",
            UnitKind::TableObject => "table_object",
        }
    }
}

/// Coarse error category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Textual,
    Bibliographic,
    Logical,
    #[default]
    None,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Textual => "textual",
            Category::Bibliographic => "bibliographic",
            Category::Logical => "logical",
            Category::None => "none",
        }
    }

    /// Parse a classifier answer. Accepts English and Portuguese labels,
    /// surrounding quotes and trailing punctuation. Anything else is `None`.
    pub fn parse_label(answer: &str) -> Self {
        let cleaned: String = answer
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphabetic() || c.is_whitespace())
            .collect();
        let cleaned = cleaned.trim();

        if let Some(category) = Self::from_word(cleaned) {
            return category;
        }

        // Fall back to the first recognizable word ("Category: textual.")
        cleaned
            .split_whitespace()
            .find_map(Self::from_word)
            .unwrap_or(Category::None)
    }

    fn from_word(word: &str) -> Option<Self> {
        match word {
            "textual" => Some(Category::Textual),
            "bibliographic" | "bibliografico" | "bibliográfico" => Some(Category::Bibliographic),
            "logical" | "logico" | "lógico" => Some(Category::Logical),
            "none" | "nenhum" => Some(Category::None),
            _ => None,
        }
    }
}

/// Location of a unit inside the document model.
///
/// Indices are 0-based; user-facing origin labels are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum Anchor {
    Body {
        paragraph: usize,
    },
    Cell {
        table: usize,
        row: usize,
        column: usize,
        paragraph: usize,
    },
    Table {
        table: usize,
    },
    Header {
        section: usize,
        paragraph: usize,
    },
    Footer {
        section: usize,
        paragraph: usize,
    },
}

/// One addressable piece of document content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: usize,
    pub kind: UnitKind,
    /// Human-readable location, e.g. "Table 2, Row 3, Column 1".
    pub origin: String,
    pub raw_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip)]
    pub image_blob: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub anchor: Anchor,
}

impl ContentUnit {
    pub fn text(id: usize, kind: UnitKind, origin: String, text: String, anchor: Anchor) -> Self {
        Self {
            id,
            kind,
            origin,
            raw_content: text,
            corrected_content: None,
            category: None,
            image_blob: None,
            image_mime: None,
            caption: None,
            anchor,
        }
    }

    pub fn image(
        id: usize,
        origin: String,
        blob: Vec<u8>,
        mime: String,
        caption: Option<String>,
        anchor: Anchor,
    ) -> Self {
        Self {
            id,
            kind: UnitKind::Image,
            origin,
            raw_content: String::new(),
            corrected_content: None,
            category: None,
            image_blob: Some(blob),
            image_mime: Some(mime),
            caption,
            anchor,
        }
    }

    /// Text and table-cell units go through classification and correction.
    pub fn is_textual(&self) -> bool {
        matches!(self.kind, UnitKind::Text | UnitKind::TableCell)
    }

    /// Corrected text when a correction was accepted, otherwise the original.
    pub fn effective_text(&self) -> &str {
        self.corrected_content
            .as_deref()
            .unwrap_or(&self.raw_content)
    }

    pub fn category(&self) -> Category {
        self.category.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_plain() {
        assert_eq!(Category::parse_label("textual"), Category::Textual);
        assert_eq!(Category::parse_label("  Bibliografico\n"), Category::Bibliographic);
        assert_eq!(Category::parse_label("'lógico'"), Category::Logical);
        assert_eq!(Category::parse_label("nenhum."), Category::None);
    }

    #[test]
    fn test_parse_label_embedded() {
        assert_eq!(Category::parse_label("Category: bibliographic."), Category::Bibliographic);
    }

    #[test]
    fn test_parse_label_unknown_defaults_to_none() {
        assert_eq!(Category::parse_label("I cannot tell"), Category::None);
        assert_eq!(Category::parse_label(""), Category::None);
    }

    #[test]
    fn test_effective_text_prefers_correction() {
        let mut unit = ContentUnit::text(
            0,
            UnitKind::Text,
            "Paragraph 1".into(),
            "teh text".into(),
            Anchor::Body { paragraph: 0 },
        );
        assert_eq!(unit.effective_text(), "teh text");
        unit.corrected_content = Some("the text".into());
        assert_eq!(unit.effective_text(), "the text");
    }
}
