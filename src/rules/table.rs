//! Planned / executed / difference reconciliation for tables.

use super::numbers::parse_localized;
use crate::config::{HeaderSynonyms, RuleConfig};
use crate::models::{Rule, Severity, ValidationFinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Planned,
    Executed,
    Difference,
    Total,
    Other,
}

fn normalize(cell: &str, headers: &HeaderSynonyms) -> Column {
    let lower = cell.trim().to_lowercase();
    let matches = |synonyms: &[String]| synonyms.iter().any(|s| lower.contains(&s.to_lowercase()));

    if matches(&headers.planned) {
        Column::Planned
    } else if matches(&headers.executed) {
        Column::Executed
    } else if matches(&headers.difference) {
        Column::Difference
    } else if matches(&headers.total) {
        Column::Total
    } else {
        Column::Other
    }
}

fn value(row: &[String], i: usize) -> Option<f64> {
    row.get(i).and_then(|c| parse_localized(c))
}

#[derive(Debug, Default)]
struct Sums {
    planned: f64,
    executed: f64,
    difference: f64,
}

pub(super) fn reconcile(rows: &[Vec<String>], config: &RuleConfig) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    let Some(header) = rows.first() else {
        return findings;
    };
    if header.len() < 3 {
        return findings;
    }

    let columns: Vec<Column> = header.iter().map(|h| normalize(h, &config.headers)).collect();
    let position = |col: Column| columns.iter().position(|c| *c == col);
    let (Some(i_plan), Some(i_exec), Some(i_diff)) = (
        position(Column::Planned),
        position(Column::Executed),
        position(Column::Difference),
    ) else {
        return findings;
    };

    let tolerance = config.tolerance;
    let mut sums = Sums::default();
    let mut total_row = None;

    for (idx, row) in rows.iter().enumerate().skip(1) {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if row
            .iter()
            .any(|c| normalize(c, &config.headers) == Column::Total)
        {
            total_row = Some(idx);
            continue;
        }

        let planned = value(row, i_plan);
        let executed = value(row, i_exec);
        let difference = value(row, i_diff);

        sums.planned += planned.unwrap_or(0.0);
        sums.executed += executed.unwrap_or(0.0);
        sums.difference += difference.unwrap_or(0.0);

        if let (Some(planned), Some(executed), Some(difference)) = (planned, executed, difference) {
            let computed = executed - planned;
            if (computed - difference).abs() > tolerance {
                findings.push(ValidationFinding::new(
                    Rule::DifferenceMismatch,
                    format!("row {}", idx + 1),
                    format!(
                        "Executed({}) - Planned({}) = {:.2}, stated difference = {:.2}",
                        executed, planned, computed, difference
                    ),
                    Severity::High,
                ));
            }
        }
    }

    if let Some(idx) = total_row {
        let row = &rows[idx];
        let checks = [
            (Rule::TotalPlannedMismatch, "Planned", i_plan, sums.planned),
            (Rule::TotalExecutedMismatch, "Executed", i_exec, sums.executed),
            (Rule::TotalDifferenceMismatch, "Difference", i_diff, sums.difference),
        ];
        for (rule, label, i, sum) in checks {
            if let Some(stated) = value(row, i) {
                if (stated - sum).abs() > tolerance {
                    findings.push(ValidationFinding::new(
                        rule,
                        format!("row {}", idx + 1),
                        format!("TOTAL {} {:.2} does not match sum {:.2}", label, stated, sum),
                        Severity::High,
                    ));
                }
            }
        }
    }

    findings
}
