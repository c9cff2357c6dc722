//! Command-line interface.

mod commands;
mod icons;
mod progress;

pub use commands::{default_log_directive, is_verbose, run, LOG_ENV};
