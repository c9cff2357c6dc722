//! Revisor - concurrent document review pipeline.
//!
//! Decomposes a parsed document into content units, then classifies and
//! corrects them with an inference backend, validates numbers, times and
//! tables with deterministic rules, cross-checks citations against the
//! bibliography and asks for a final global contradiction report.

pub mod cli;
pub mod config;
pub mod document;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod services;
pub mod supervisor;

pub use config::Config;
pub use pipeline::{PipelineOrchestrator, RunMode, RunOutcome, RunRequest};
