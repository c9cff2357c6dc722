//! Parsed document model.
//!
//! Documents arrive as JSON produced by an external converter: body
//! paragraphs (with inline images as base64), tables of cells, and
//! per-section headers and footers. Accepted corrections are written back
//! into this model and the result is saved next to the reports.

pub mod mapper;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Anchor;

pub use mapper::ContentMapper;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to read document {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write document {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<InlineImage>,
}

/// An embedded image. `data` is base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineImage {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    pub data: String,
}

fn default_mime_type() -> String {
    "image/png".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

impl Cell {
    /// Cell text with paragraphs joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub header: Vec<Paragraph>,
    #[serde(default)]
    pub footer: Vec<Paragraph>,
}

impl Document {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub async fn open(path: &Path) -> Result<Self, DocumentError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DocumentError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&contents).map_err(|source| DocumentError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub async fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let write_err = |source| DocumentError::Write {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(path, json).await.map_err(write_err)
    }

    /// Replace the text of the paragraph at `anchor`, keeping any images.
    /// Returns false when the anchor does not address a paragraph.
    pub fn set_text(&mut self, anchor: &Anchor, text: &str) -> bool {
        let paragraph = match *anchor {
            Anchor::Body { paragraph } => self.paragraphs.get_mut(paragraph),
            Anchor::Cell {
                table,
                row,
                column,
                paragraph,
            } => self
                .tables
                .get_mut(table)
                .and_then(|t| t.rows.get_mut(row))
                .and_then(|r| r.cells.get_mut(column))
                .and_then(|c| c.paragraphs.get_mut(paragraph)),
            Anchor::Header { section, paragraph } => self
                .sections
                .get_mut(section)
                .and_then(|s| s.header.get_mut(paragraph)),
            Anchor::Footer { section, paragraph } => self
                .sections
                .get_mut(section)
                .and_then(|s| s.footer.get_mut(paragraph)),
            Anchor::Table { .. } => None,
        };

        match paragraph {
            Some(p) => {
                p.text = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Table as a grid of trimmed cell texts, or `None` if out of range.
    pub fn table_grid(&self, table: usize) -> Option<Vec<Vec<String>>> {
        self.tables.get(table).map(|t| {
            t.rows
                .iter()
                .map(|row| row.cells.iter().map(|c| c.text().trim().to_string()).collect())
                .collect()
        })
    }
}
