//! Command-line interface and config loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use sy_domain::config::Config;

/// Default config filename, looked up in the working directory.
const DEFAULT_CONFIG: &str = "switchyard.toml";

#[derive(Debug, Parser)]
#[command(name = "switchyard", version, about = "Multi-tenant hub routing conversational turns to MCP tool backends")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway (the default).
    Serve,
    /// Config inspection.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config and report warnings.
    Validate,
    /// Print the effective config (defaults applied).
    Show,
}

/// Load config from the given path, the default file, or built-in
/// defaults when neither exists.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            default.exists().then_some(default)
        }
    };

    match path {
        Some(p) => {
            let raw = std::fs::read_to_string(&p)
                .with_context(|| format!("reading config file {}", p.display()))?;
            let config: Config = toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", p.display()))?;
            Ok((config, Some(p)))
        }
        None => Ok((Config::default(), None)),
    }
}

/// Print validation warnings; returns false when the config should not be
/// served as-is.
pub fn validate(config: &Config, path: Option<&Path>) -> bool {
    match path {
        Some(p) => println!("config: {}", p.display()),
        None => println!("config: built-in defaults"),
    }
    let warnings = config.validate();
    for warning in &warnings {
        println!("warning: {warning}");
    }
    if warnings.is_empty() {
        println!("ok");
    }
    warnings.is_empty()
}

/// Print the effective config with defaults applied.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
