//! pg-safe-update: apply a schema file without losing data.
//!
//! # Usage
//!
//! ```bash
//! # Show what would run
//! pg-safe-update schema.sql --dry-run
//!
//! # Apply, backing up first
//! pg-safe-update schema.sql
//!
//! # Unattended
//! pg-safe-update schema.sql --yes --backup-dir /var/backups/pg
//! ```

use clap::{Parser, ValueEnum};
use colored::*;
use pg_safe_update::settings::Settings;
use pg_safe_update::update::{OutputFormat, UpdateConfig, run_update};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pg-safe-update")]
#[command(version)]
#[command(about = "Apply a PostgreSQL schema file without clobbering existing objects", long_about = None)]
#[command(after_help = "EXAMPLES:
    pg-safe-update schema.sql --dry-run
    pg-safe-update schema.sql --env-file deploy/.env --yes
    pg-safe-update schema.sql --dry-run --format json")]
struct Cli {
    /// Schema file to apply (default: schema.sql)
    schema: Option<PathBuf>,

    /// File holding DATABASE_URL
    #[arg(long, env = "PG_SAFE_UPDATE_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Settings file (default: ./pg-safe-update.toml)
    #[arg(short, long, env = "PG_SAFE_UPDATE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the pre-update pg_dump snapshot
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Apply without taking a snapshot
    #[arg(long)]
    no_backup: bool,

    /// Admit DROP, TRUNCATE and ALTER ... DROP statements
    #[arg(long)]
    allow_destructive: bool,

    /// Fail instead of creating a missing database
    #[arg(long)]
    no_create_database: bool,

    /// Print the plan and stop
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Plan output format (text or json); needs --dry-run
    #[arg(short, long, value_enum, requires = "dry_run")]
    format: Option<Format>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl Cli {
    fn into_config(self, settings: Settings) -> UpdateConfig {
        let mut config = UpdateConfig::from(settings);

        if let Some(schema) = self.schema {
            config.schema_file = schema;
        }
        if let Some(env_file) = self.env_file {
            config.env_file = env_file;
        }
        if let (Some(dir), Some(backup)) = (self.backup_dir, config.backup.as_mut()) {
            backup.dir = dir;
        }
        if self.no_backup {
            config.backup = None;
        }
        config.policy.allow_destructive |= self.allow_destructive;
        config.create_database &= !self.no_create_database;
        config.dry_run = self.dry_run;
        config.assume_yes = self.yes;
        config.format = match self.format {
            Some(Format::Json) => OutputFormat::Json,
            Some(Format::Text) | None => OutputFormat::Text,
        };
        config
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pg_safe_update=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = run_update(cli.into_config(settings)).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}
