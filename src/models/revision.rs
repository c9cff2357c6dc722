//! Accepted corrections and citation gaps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which correction prompt produced a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Textual,
    Bibliographic,
}

impl RevisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionKind::Textual => "textual",
            RevisionKind::Bibliographic => "bibliographic",
        }
    }

    /// Cost-ledger phase the correction call is billed to.
    pub fn ledger_phase(&self) -> &'static str {
        match self {
            RevisionKind::Textual => "textual_revision",
            RevisionKind::Bibliographic => "bibliographic_revision",
        }
    }
}

/// A correction that passed the similarity gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub kind: RevisionKind,
    pub origin: String,
    pub original_text: String,
    pub corrected_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_validation_notes: Option<String>,
    pub justification: String,
}

/// An in-text citation with no matching bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CitationGap {
    pub author: String,
    pub year: String,
}

impl fmt::Display for CitationGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.author, self.year)
    }
}
