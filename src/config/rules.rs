//! Rule validator settings: keyword sets, header synonyms, tolerance.
//!
//! Defaults cover the Portuguese keywords the validators were written for
//! plus their English equivalents. Matching is literal, lowercase substring
//! presence.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Allowed absolute error for table arithmetic.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Qualifiers that place a time before noon.
    #[serde(default = "default_morning_keywords")]
    pub morning_keywords: Vec<String>,
    /// Qualifiers that place a time at or after noon.
    #[serde(default = "default_late_keywords")]
    pub late_keywords: Vec<String>,
    /// Words asserting the first date is later than the second.
    #[serde(default = "default_after_keywords")]
    pub after_keywords: Vec<String>,
    /// Words asserting the first date is earlier than the second.
    #[serde(default = "default_before_keywords")]
    pub before_keywords: Vec<String>,
    #[serde(default)]
    pub headers: HeaderSynonyms,
}

/// Surface header strings mapped to canonical table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSynonyms {
    #[serde(default = "default_planned")]
    pub planned: Vec<String>,
    #[serde(default = "default_executed")]
    pub executed: Vec<String>,
    #[serde(default = "default_difference")]
    pub difference: Vec<String>,
    #[serde(default = "default_total")]
    pub total: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_tolerance() -> f64 {
    0.009
}

fn default_morning_keywords() -> Vec<String> {
    strings(&["da manhã", "in the morning"])
}

fn default_late_keywords() -> Vec<String> {
    strings(&["da tarde", "da noite", "in the afternoon", "in the evening"])
}

fn default_after_keywords() -> Vec<String> {
    strings(&["depois", "after"])
}

fn default_before_keywords() -> Vec<String> {
    strings(&["antes", "before"])
}

fn default_planned() -> Vec<String> {
    strings(&["planejado", "orcado", "orçado", "planned", "budgeted"])
}

fn default_executed() -> Vec<String> {
    strings(&["executado", "realizado", "executed", "actual"])
}

fn default_difference() -> Vec<String> {
    strings(&["diferença", "diferenca", "variação", "variacao", "difference", "variance"])
}

fn default_total() -> Vec<String> {
    strings(&["total"])
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            morning_keywords: default_morning_keywords(),
            late_keywords: default_late_keywords(),
            after_keywords: default_after_keywords(),
            before_keywords: default_before_keywords(),
            headers: HeaderSynonyms::default(),
        }
    }
}

impl Default for HeaderSynonyms {
    fn default() -> Self {
        Self {
            planned: default_planned(),
            executed: default_executed(),
            difference: default_difference(),
            total: default_total(),
        }
    }
}
