use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Rolling btrfs and ZFS snapshots per retention class.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by every subcommand
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(
        short,
        long,
        global = true,
        env = "MINISNAP_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Configuration file path"
    )]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Enable quiet mode (warnings and errors only)"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create and delete snapshots so every volume matches its schedule
    Run {
        #[arg(long, help = "Log the commands instead of executing them")]
        dry_run: bool,

        #[arg(required = true, help = "Volumes to work on")]
        volumes: Vec<String>,
    },
    /// Print what `run` would do without touching any snapshot
    Plan {
        #[arg(long, help = "Print the plan in JSON format")]
        json: bool,

        #[arg(required = true, help = "Volumes to plan for")]
        volumes: Vec<String>,
    },
    /// Show the loaded configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate the configuration and exit
    Validate,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Pick the default log level from the CLI flags.
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging; an explicit `RUST_LOG` takes precedence over the flags.
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn load_config(args: &CommonArgs) -> Result<Configuration> {
        tracing::debug!(path = %args.config.display(), "Loading configuration");
        Configuration::load_from_path(&args.config)
            .with_context(|| format!("Failed to load '{}'", args.config.display()))
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
            return Ok(());
        }

        println!("minisnap configuration:");
        println!("=======================");
        println!("Dry run: {}", config.dry_run);
        println!("btrfs snapshot dir: {}", config.btrfs.snapshot_dir);
        println!("ZFS snapshot prefix: {}", config.zfs.snapshot_prefix);

        if config.targets.is_empty() {
            println!("Volumes: none");
        }
        for (volume, policy) in &config.targets {
            let schedule = policy
                .schedule
                .iter()
                .map(|(class, count)| format!("{class}={count}"))
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "Volume {volume}: [{schedule}] recursive={}",
                policy.options.recursive
            );
        }
        Ok(())
    }

    /// Report configuration problems that are legal but most likely mistakes.
    pub fn validate_config(config: &Configuration) -> Result<Vec<String>> {
        tracing::info!("Validating configuration...");

        if config.btrfs.snapshot_dir.is_empty() || config.btrfs.snapshot_dir.contains('/') {
            anyhow::bail!(
                "btrfs snapshot_dir must be a single path component, got '{}'",
                config.btrfs.snapshot_dir
            );
        }
        if config.zfs.snapshot_prefix.contains('@') {
            anyhow::bail!(
                "ZFS snapshot_prefix must not contain '@', got '{}'",
                config.zfs.snapshot_prefix
            );
        }

        let mut warnings = Vec::new();
        if config.targets.is_empty() {
            warnings.push("no volumes are configured".to_string());
        }
        for (volume, policy) in &config.targets {
            if !policy.keeps_anything() {
                warnings.push(format!(
                    "volume {volume} keeps no snapshots; every stale snapshot will be deleted"
                ));
            }
        }

        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        tracing::info!("Configuration validation passed");
        Ok(warnings)
    }
}
