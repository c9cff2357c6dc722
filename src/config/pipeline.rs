//! Pipeline concurrency, acceptance thresholds and cost rates.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker pool size for multimodal / heavy phases.
    #[serde(default = "default_heavy_workers")]
    pub heavy_workers: usize,
    /// Worker pool size for lightweight text-only phases.
    #[serde(default = "default_light_workers")]
    pub light_workers: usize,
    /// Corrections at or above this similarity to the original are treated as echoes.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Units with this many characters or fewer are skipped by the
    /// lightweight classifier and the per-unit AI analysis.
    #[serde(default = "default_min_unit_chars")]
    pub min_unit_chars: usize,
    /// Interval for the background cancellation watcher.
    #[serde(default = "default_cancel_poll_ms")]
    pub cancel_poll_ms: u64,
}

fn default_heavy_workers() -> usize {
    5
}

fn default_light_workers() -> usize {
    10
}

fn default_similarity_threshold() -> f64 {
    0.999
}

fn default_min_unit_chars() -> usize {
    15
}

fn default_cancel_poll_ms() -> u64 {
    250
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            heavy_workers: default_heavy_workers(),
            light_workers: default_light_workers(),
            similarity_threshold: default_similarity_threshold(),
            min_unit_chars: default_min_unit_chars(),
            cancel_poll_ms: default_cancel_poll_ms(),
        }
    }
}

/// Token prices (USD per 1000 tokens) and local currency conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    #[serde(default = "default_input_per_1k")]
    pub input_per_1k: f64,
    #[serde(default = "default_output_per_1k")]
    pub output_per_1k: f64,
    /// Local currency units per USD.
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_input_per_1k() -> f64 {
    0.005
}

fn default_output_per_1k() -> f64 {
    0.015
}

fn default_exchange_rate() -> f64 {
    5.65
}

fn default_currency() -> String {
    "BRL".to_string()
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            input_per_1k: default_input_per_1k(),
            output_per_1k: default_output_per_1k(),
            exchange_rate: default_exchange_rate(),
            currency: default_currency(),
        }
    }
}

impl CostConfig {
    /// USD cost of a token count.
    pub fn usd(&self, tokens_in: u64, tokens_out: u64) -> f64 {
        (tokens_in as f64 * self.input_per_1k + tokens_out as f64 * self.output_per_1k) / 1000.0
    }

    pub fn to_local(&self, usd: f64) -> f64 {
        usd * self.exchange_rate
    }
}
