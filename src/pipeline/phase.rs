//! Phases, run modes and run status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Progress reported when a run starts, before any phase.
pub const START_PROGRESS: u8 = 5;

/// Progress reported by every terminal success or error checkpoint.
pub const FINAL_PROGRESS: u8 = 100;

/// Pipeline phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Mapping,
    Classifying,
    Revising,
    CrossChecking,
    RuleValidating,
    AiAnalyzing,
    Aggregating,
    Finalizing,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Mapping,
        Phase::Classifying,
        Phase::Revising,
        Phase::CrossChecking,
        Phase::RuleValidating,
        Phase::AiAnalyzing,
        Phase::Aggregating,
        Phase::Finalizing,
    ];

    /// Progress percentage reported once the phase completes.
    pub fn checkpoint(&self) -> u8 {
        match self {
            Phase::Mapping => 15,
            Phase::Classifying => 30,
            Phase::Revising => 60,
            Phase::CrossChecking => 75,
            Phase::RuleValidating => 80,
            Phase::AiAnalyzing => 88,
            Phase::Aggregating => 90,
            Phase::Finalizing => 95,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Mapping => "mapping",
            Phase::Classifying => "classifying",
            Phase::Revising => "revising",
            Phase::CrossChecking => "cross_checking",
            Phase::RuleValidating => "rule_validating",
            Phase::AiAnalyzing => "ai_analyzing",
            Phase::Aggregating => "aggregating",
            Phase::Finalizing => "finalizing",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Mapping => "Mapping document",
            Phase::Classifying => "Classifying units",
            Phase::Revising => "Revising units",
            Phase::CrossChecking => "Cross-checking citations",
            Phase::RuleValidating => "Validating rules",
            Phase::AiAnalyzing => "Analyzing content",
            Phase::Aggregating => "Global analysis",
            Phase::Finalizing => "Writing outputs",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which subset of the pipeline a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every phase, full label set, justifications.
    #[default]
    Full,
    /// Binary classification and textual corrections only.
    Textual,
    /// Rule validation and AI analysis without corrections.
    Consistency,
}

impl RunMode {
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            RunMode::Full => &Phase::ALL,
            RunMode::Textual => &[
                Phase::Mapping,
                Phase::Classifying,
                Phase::Revising,
                Phase::Finalizing,
            ],
            RunMode::Consistency => &[
                Phase::Mapping,
                Phase::RuleValidating,
                Phase::AiAnalyzing,
                Phase::Aggregating,
                Phase::Finalizing,
            ],
        }
    }

    pub fn includes(&self, phase: Phase) -> bool {
        self.phases().contains(&phase)
    }

    /// Textual runs are all short text calls and use the light pool.
    pub fn uses_light_pool(&self) -> bool {
        matches!(self, RunMode::Textual)
    }

    /// Whether units at or below the minimum length are skipped for inference.
    pub fn skips_short_units(&self) -> bool {
        !matches!(self, RunMode::Full)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Textual => "textual",
            RunMode::Consistency => "consistency",
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" | "complete" => Ok(RunMode::Full),
            "textual" | "text" => Ok(RunMode::Textual),
            "consistency" | "logic" => Ok(RunMode::Consistency),
            other => Err(format!(
                "unknown run mode '{}' (expected full, textual or consistency)",
                other
            )),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status attached to progress reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[serde(rename = "processing")]
    Running,
    Completed,
    Cancelled,
    #[serde(rename = "error")]
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_increase() {
        let checkpoints: Vec<u8> = Phase::ALL.iter().map(Phase::checkpoint).collect();
        assert!(checkpoints.windows(2).all(|w| w[0] < w[1]));
        assert!(START_PROGRESS < checkpoints[0]);
        assert!(*checkpoints.last().unwrap() < FINAL_PROGRESS);
    }

    #[test]
    fn test_mode_phases_keep_order() {
        for mode in [RunMode::Full, RunMode::Textual, RunMode::Consistency] {
            let phases = mode.phases();
            assert_eq!(phases[0], Phase::Mapping);
            assert_eq!(*phases.last().unwrap(), Phase::Finalizing);
            let checkpoints: Vec<u8> = phases.iter().map(Phase::checkpoint).collect();
            assert!(checkpoints.windows(2).all(|w| w[0] < w[1]));
        }
        assert!(!RunMode::Textual.includes(Phase::Aggregating));
        assert!(!RunMode::Consistency.includes(Phase::Revising));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Textual".parse::<RunMode>(), Ok(RunMode::Textual));
        assert_eq!("consistency".parse::<RunMode>(), Ok(RunMode::Consistency));
        assert!("fast".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&RunStatus::Failed).unwrap(), "\"error\"");
        assert_eq!(serde_json::to_string(&RunStatus::Running).unwrap(), "\"processing\"");
        assert_eq!(serde_json::to_string(&RunStatus::Cancelled).unwrap(), "\"cancelled\"");
    }
}
