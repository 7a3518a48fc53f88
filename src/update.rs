//! The update run, from credentials to applied statements.

use sqlx::Connection;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::admission::AdmissionPolicy;
use crate::backup::{BackupConfig, BackupHandle, backup_database};
use crate::catalog::{self, ExistingObjectSet};
use crate::config::ConnectionProfile;
use crate::db;
use crate::error::{UpdateError, UpdateResult};
use crate::executor::{ExecutionSummary, apply_plan};
use crate::extract::extract_statements;
use crate::plan::Plan;
use crate::report;
use crate::settings::Settings;

/// How the plan is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for one update run.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub env_file: PathBuf,
    pub schema_file: PathBuf,
    pub default_schema: String,
    pub policy: AdmissionPolicy,
    pub create_database: bool,
    /// `None` skips the snapshot.
    pub backup: Option<BackupConfig>,
    /// Print the plan and stop.
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
    pub format: OutputFormat,
}

impl From<Settings> for UpdateConfig {
    fn from(settings: Settings) -> Self {
        Self {
            env_file: settings.env_file,
            schema_file: settings.schema_file,
            default_schema: settings.default_schema,
            policy: AdmissionPolicy {
                allow_destructive: settings.allow_destructive,
            },
            create_database: settings.create_database,
            backup: Some(BackupConfig {
                dir: settings.backup_dir,
                prefix: settings.backup_prefix,
                pg_dump: settings.pg_dump,
            }),
            dry_run: false,
            assume_yes: false,
            format: OutputFormat::Text,
        }
    }
}

/// How a successful run ended.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Every statement was rejected.
    UpToDate(Plan),
    /// Plan printed, nothing touched.
    DryRun(Plan),
    Applied {
        plan: Plan,
        summary: ExecutionSummary,
        backup: Option<BackupHandle>,
    },
}

/// Extract `source` and admit each statement against `existing`.
pub fn plan_schema(
    source: &str,
    existing: &mut ExistingObjectSet,
    policy: &AdmissionPolicy,
) -> UpdateResult<Plan> {
    let statements = extract_statements(source)?;
    Ok(Plan::build(&statements, existing, policy))
}

/// Run the whole update.
pub async fn run_update(config: UpdateConfig) -> UpdateResult<UpdateOutcome> {
    let profile = ConnectionProfile::from_env_file(&config.env_file)?;
    info!(database = %profile.database, host = %profile.host, "target");

    let source = std::fs::read_to_string(&config.schema_file).map_err(|e| {
        UpdateError::Config(format!(
            "cannot read schema file {}: {}",
            config.schema_file.display(),
            e
        ))
    })?;
    // Fail on malformed SQL before touching the server.
    let statements = extract_statements(&source)?;

    let mut existing = if config.dry_run && !db::target_database_exists(&profile).await? {
        warn!(database = %profile.database, "database does not exist yet, planning against an empty catalog");
        ExistingObjectSet::new(config.default_schema.as_str())
    } else {
        if !config.dry_run && config.create_database && db::ensure_database(&profile).await? {
            report::print_database_created(&profile.database);
        }
        inspect_target(&profile, &config.default_schema).await?
    };

    let plan = Plan::build(&statements, &mut existing, &config.policy);

    match config.format {
        OutputFormat::Json => println!("{}", report::plan_json(&plan)?),
        OutputFormat::Text => report::print_plan(&plan),
    }

    if config.dry_run {
        if config.format == OutputFormat::Text {
            report::print_dry_run();
        }
        return Ok(UpdateOutcome::DryRun(plan));
    }

    if plan.is_up_to_date() {
        report::print_up_to_date();
        return Ok(UpdateOutcome::UpToDate(plan));
    }

    report::print_preview(&plan);
    if !config.assume_yes && !report::confirm("Proceed with the update?") {
        return Err(UpdateError::Aborted);
    }

    let backup = match &config.backup {
        Some(backup_config) => {
            let handle = backup_database(&profile, backup_config).await?;
            report::print_backup(&handle);
            Some(handle)
        }
        None => {
            warn!("backup disabled, applying without a snapshot");
            None
        }
    };

    let mut conn = db::connect(&profile).await?;
    let summary = apply_plan(&mut conn, &plan, report::print_event).await?;
    conn.close().await.ok();

    report::print_summary(&summary, backup.as_ref());
    Ok(UpdateOutcome::Applied {
        plan,
        summary,
        backup,
    })
}

async fn inspect_target(
    profile: &ConnectionProfile,
    default_schema: &str,
) -> UpdateResult<ExistingObjectSet> {
    let mut conn = db::connect(profile).await?;
    let existing = catalog::inspect(&mut conn, default_schema).await?;
    conn.close().await.ok();
    info!(objects = existing.len(), "catalog inspected");
    Ok(existing)
}
