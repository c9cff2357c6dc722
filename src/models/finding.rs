//! Deterministic validation findings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which deterministic rule produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    ImpossiblePercentage,
    PeriodOfDayMismatch,
    ChronologyMismatch,
    DifferenceMismatch,
    TotalPlannedMismatch,
    TotalExecutedMismatch,
    TotalDifferenceMismatch,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::ImpossiblePercentage => "impossible_percentage",
            Rule::PeriodOfDayMismatch => "period_of_day_mismatch",
            Rule::ChronologyMismatch => "chronology_mismatch",
            Rule::DifferenceMismatch => "difference_mismatch",
            Rule::TotalPlannedMismatch => "total_planned_mismatch",
            Rule::TotalExecutedMismatch => "total_executed_mismatch",
            Rule::TotalDifferenceMismatch => "total_difference_mismatch",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem found by a rule validator. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub rule: Rule,
    /// Origin label of the unit the finding belongs to. Empty until the
    /// orchestrator attributes it.
    pub origin: String,
    pub affected_text: String,
    pub detail: String,
    pub severity: Severity,
}

impl ValidationFinding {
    pub(crate) fn new(
        rule: Rule,
        affected_text: impl Into<String>,
        detail: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            rule,
            origin: String::new(),
            affected_text: affected_text.into(),
            detail: detail.into(),
            severity,
        }
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }
}
