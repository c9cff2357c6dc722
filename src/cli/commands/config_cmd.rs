//! Configuration management commands.

use console::style;

use crate::config::Config;

/// Print the effective configuration.
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("********".to_string());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

pub fn cmd_config_path(config: &Config) -> anyhow::Result<()> {
    match &config.source_path {
        Some(path) => println!("{} {}", style("Config:").bold(), path.display()),
        None => println!(
            "{} {}",
            style("Config:").bold(),
            style("none found, using defaults").dim()
        ),
    }

    let base_dir = config.base_dir();
    let base_dir = base_dir.as_deref();
    let paths = &config.paths;
    println!("{} {}", style("Output:").bold(), paths.output_dir(base_dir).display());
    println!("{} {}", style("Cancel:").bold(), paths.cancel_dir(base_dir).display());
    println!("{} {}", style("Status:").bold(), paths.status_dir(base_dir).display());
    println!("{} {}", style("Ledger:").bold(), paths.ledger_file(base_dir).display());
    Ok(())
}
