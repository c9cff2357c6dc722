//! Deterministic validators.
//!
//! Everything here is pure: no I/O, no inference, and no error paths.
//! Input that cannot be checked (missing columns, invalid dates, unparseable
//! numbers) produces no finding.

pub mod numbers;
mod table;
mod text;

use regex::Regex;

use crate::config::RuleConfig;
use crate::models::ValidationFinding;

/// Runs the text and table rules with a fixed configuration.
#[derive(Debug, Clone)]
pub struct RuleValidator {
    config: RuleConfig,
    morning_span: Option<Regex>,
    late_span: Option<Regex>,
}

impl RuleValidator {
    pub fn new(config: RuleConfig) -> Self {
        let morning_span = text::time_span_pattern(&config.morning_keywords);
        let late_span = text::time_span_pattern(&config.late_keywords);
        Self {
            config,
            morning_span,
            late_span,
        }
    }

    /// Percentage, period-of-day and chronology checks, in that order.
    pub fn validate_text(&self, text: &str) -> Vec<ValidationFinding> {
        let mut findings = text::impossible_percentages(text);
        findings.extend(text::period_of_day(
            text,
            &self.config,
            self.morning_span.as_ref(),
            self.late_span.as_ref(),
        ));
        findings.extend(text::chronology(text, &self.config));
        findings
    }

    /// Reconcile a table given as rows of cell text, header first.
    pub fn validate_table(&self, rows: &[Vec<String>]) -> Vec<ValidationFinding> {
        table::reconcile(rows, &self.config)
    }
}

impl Default for RuleValidator {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rule, Severity};

    #[test]
    fn test_validate_text_combines_rules() {
        let validator = RuleValidator::default();
        let findings =
            validator.validate_text("Em 10/05/2024, antes de 01/05/2024, às 15:00 da manhã, 120% pago.");
        let rules: Vec<Rule> = findings.iter().map(|f| f.rule).collect();
        assert_eq!(
            rules,
            vec![
                Rule::ImpossiblePercentage,
                Rule::PeriodOfDayMismatch,
                Rule::ChronologyMismatch
            ]
        );
        assert!(findings.iter().all(|f| f.origin.is_empty()));
    }

    #[test]
    fn test_clean_text_has_no_findings() {
        let validator = RuleValidator::default();
        assert!(validator
            .validate_text("O projeto atingiu 85% da meta às 10:00 da manhã.")
            .is_empty());
    }

    #[test]
    fn test_validate_table() {
        let validator = RuleValidator::default();
        let rows = vec![
            vec!["Planejado".to_string(), "Executado".into(), "Diferença".into()],
            vec!["100".to_string(), "80".into(), "-15".into()],
        ];
        let findings = validator.validate_table(&rows);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }
}
