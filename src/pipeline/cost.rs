//! Token accounting per phase and conversion to money.

use serde::{Deserialize, Serialize};

use crate::config::CostConfig;
pub use crate::llm::TokenUsage;

pub const CLASSIFICATION: &str = "classification";
pub const TEXTUAL_REVISION: &str = "textual_revision";
pub const BIBLIOGRAPHIC_REVISION: &str = "bibliographic_revision";
pub const JUSTIFICATION: &str = "justification";
pub const CONTENT_ANALYSIS: &str = "content_analysis";
pub const GLOBAL_ANALYSIS: &str = "global_analysis";

/// Label of the summary row.
pub const TOTAL: &str = "total";

/// Running token totals per phase, in first-recorded order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    phases: Vec<(String, TokenUsage)>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage to a phase. Totals only grow.
    pub fn record(&mut self, phase: &str, usage: TokenUsage) {
        match self.phases.iter_mut().find(|(name, _)| name == phase) {
            Some((_, total)) => *total += usage,
            None => self.phases.push((phase.to_string(), usage)),
        }
    }

    pub fn get(&self, phase: &str) -> TokenUsage {
        self.phases
            .iter()
            .find(|(name, _)| name == phase)
            .map(|(_, usage)| *usage)
            .unwrap_or_default()
    }

    pub fn total(&self) -> TokenUsage {
        self.phases
            .iter()
            .fold(TokenUsage::default(), |acc, (_, usage)| acc + *usage)
    }

    /// One row per phase with non-zero usage, then the total row.
    pub fn rows(&self, costs: &CostConfig) -> Vec<CostRow> {
        let mut rows: Vec<CostRow> = self
            .phases
            .iter()
            .filter(|(_, usage)| !usage.is_zero())
            .map(|(phase, usage)| CostRow::new(phase, *usage, costs))
            .collect();
        rows.push(CostRow::new(TOTAL, self.total(), costs));
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    pub phase: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub cost_local: f64,
}

impl CostRow {
    fn new(phase: &str, usage: TokenUsage, costs: &CostConfig) -> Self {
        let usd = costs.usd(usage.tokens_in, usage.tokens_out);
        Self {
            phase: phase.to_string(),
            tokens_in: usage.tokens_in,
            tokens_out: usage.tokens_out,
            cost_usd: round_to(usd, 4),
            cost_local: round_to(costs.to_local(usd), 2),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut ledger = CostLedger::new();
        ledger.record(CLASSIFICATION, TokenUsage::new(100, 10));
        ledger.record(CLASSIFICATION, TokenUsage::new(50, 5));
        ledger.record(GLOBAL_ANALYSIS, TokenUsage::new(1000, 200));

        assert_eq!(ledger.get(CLASSIFICATION), TokenUsage::new(150, 15));
        assert_eq!(ledger.get(JUSTIFICATION), TokenUsage::default());
        assert_eq!(ledger.total(), TokenUsage::new(1150, 215));
    }

    #[test]
    fn test_rows_skip_zero_phases() {
        let mut ledger = CostLedger::new();
        ledger.record(CLASSIFICATION, TokenUsage::new(1000, 1000));
        ledger.record(JUSTIFICATION, TokenUsage::default());

        let costs = CostConfig::default();
        let rows = ledger.rows(&costs);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].phase, CLASSIFICATION);
        assert_eq!(rows[1].phase, TOTAL);

        // 1k in at 0.005 + 1k out at 0.015
        assert!((rows[0].cost_usd - 0.02).abs() < 1e-9);
        assert!((rows[0].cost_local - 0.11).abs() < 1e-9);
    }

    #[test]
    fn test_empty_ledger_has_total_row() {
        let rows = CostLedger::new().rows(&CostConfig::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tokens_in, 0);
        assert_eq!(rows[0].cost_usd, 0.0);
    }
}
