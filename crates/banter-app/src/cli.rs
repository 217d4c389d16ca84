//! CLI argument definitions for the Banter application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Banter - hotkey-driven match chat and voice lines in a chosen persona.
#[derive(Parser, Debug)]
#[command(name = "banter", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Shorthand for --log-level debug.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long = "json-logs")]
    pub json_logs: bool,

    /// Never call remote APIs or press keys; log what would happen.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Maintenance commands. Each runs and exits without registering hotkeys.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Inspect or clear the response cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show recorded usage and cost.
    Analytics {
        #[command(subcommand)]
        action: AnalyticsAction,
    },
    /// Write the effective configuration to the config path.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Count entries and bytes on disk.
    Stats,
    /// Remove every entry.
    Clear,
    /// Remove only expired entries.
    ClearExpired,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsAction {
    /// Lifetime totals across all sessions.
    Stats,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > BANTER_CONFIG env var > platform default (~/.banter/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("BANTER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --verbose > --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if self.verbose {
            return "debug".to_string();
        }
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".banter").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".banter").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let args =
            CliArgs::try_parse_from(["banter", "--dry-run", "--json-logs", "-c", "b.toml"]).unwrap();
        assert!(args.dry_run);
        assert!(args.json_logs);
        assert_eq!(args.config, Some(PathBuf::from("b.toml")));
        assert_eq!(args.resolve_config_path(), PathBuf::from("b.toml"));
        assert!(args.command.is_none());
    }

    #[test]
    fn test_parse_maintenance_commands() {
        let args = CliArgs::try_parse_from(["banter", "cache", "clear-expired"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Cache {
                action: CacheAction::ClearExpired
            })
        );

        let args = CliArgs::try_parse_from(["banter", "analytics", "stats"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Analytics {
                action: AnalyticsAction::Stats
            })
        );

        let args = CliArgs::try_parse_from(["banter", "init-config", "--force"]).unwrap();
        assert_eq!(args.command, Some(Command::InitConfig { force: true }));
    }

    #[test]
    fn test_log_level_priority() {
        let args = CliArgs::try_parse_from(["banter"]).unwrap();
        assert_eq!(args.resolve_log_level("warn"), "warn");

        let args = CliArgs::try_parse_from(["banter", "-l", "trace"]).unwrap();
        assert_eq!(args.resolve_log_level("warn"), "trace");

        let args = CliArgs::try_parse_from(["banter", "-l", "trace", "--verbose"]).unwrap();
        assert_eq!(args.resolve_log_level("warn"), "debug");
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(CliArgs::try_parse_from(["banter", "cache", "purge"]).is_err());
    }
}
