//! `codeck-daemon config show` / `codeck-daemon config validate`.

use anyhow::{Context, Result};
use colored::Colorize;

use codeck_config::ResolvedConfig;

const REDACTED: &str = "***redacted***";

fn redact(mut resolved: ResolvedConfig) -> ResolvedConfig {
    if resolved.values.gateway.internal_shared_secret.is_some() {
        resolved.values.gateway.internal_shared_secret = Some(REDACTED.to_string());
    }
    if resolved.values.indexer.embedding_api_key.is_some() {
        resolved.values.indexer.embedding_api_key = Some(REDACTED.to_string());
    }
    resolved
}

/// Load configuration, redact secrets, and print it in `format` (`"toml"`
/// or `"json"`; anything else falls back to `"toml"`).
///
/// # Errors
///
/// Returns an error if config loading or serialisation fails.
pub fn show(format: &str) -> Result<()> {
    let resolved = codeck_config::load(None, None).context("loading configuration")?;
    let resolved = redact(resolved);
    let rendered = match format {
        "json" => serde_json::to_string_pretty(&resolved.values).context("serialising as JSON")?,
        _ => toml::to_string_pretty(&resolved.values).context("serialising as TOML")?,
    };
    println!("{rendered}");
    for file in &resolved.loaded_files {
        println!("{}", format!("# loaded: {file}").dimmed());
    }
    Ok(())
}

/// Load configuration and report whether it validates, without starting
/// the daemon. Exits the process with a non-zero code on failure so this
/// is usable directly in scripts.
pub fn validate() -> Result<()> {
    match codeck_config::load(None, None) {
        Ok(resolved) => {
            println!("{}", "configuration is valid".green().bold());
            for file in &resolved.loaded_files {
                println!("  {}", file.dimmed());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {e}", "configuration is invalid:".red().bold());
            std::process::exit(1);
        }
    }
}
