//! Pre-update snapshot via `pg_dump`.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ConnectionProfile;
use crate::error::{UpdateError, UpdateResult};

/// Where and how to write the snapshot.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub dir: PathBuf,
    /// File name prefix; the database name when `None`.
    pub prefix: Option<String>,
    /// `pg_dump` executable.
    pub pg_dump: PathBuf,
}

/// A snapshot written before the update. Only used to tell the operator
/// where it is.
#[derive(Debug, Clone)]
pub struct BackupHandle {
    pub path: PathBuf,
    pub created_at: DateTime<Local>,
}

/// `<prefix>_backup_<YYYYmmdd_HHMMSS>.sql`
pub fn backup_file_name(prefix: &str, timestamp: &DateTime<Local>) -> String {
    format!("{}_backup_{}.sql", prefix, timestamp.format("%Y%m%d_%H%M%S"))
}

/// Dump the profile's database to a plain-format SQL file.
pub async fn backup_database(
    profile: &ConnectionProfile,
    config: &BackupConfig,
) -> UpdateResult<BackupHandle> {
    ensure_dir(&config.dir)?;

    let created_at = Local::now();
    let prefix = config.prefix.as_deref().unwrap_or(&profile.database);
    let path = config.dir.join(backup_file_name(prefix, &created_at));

    let mut cmd = Command::new(&config.pg_dump);
    cmd.arg("-h")
        .arg(&profile.host)
        .arg("-p")
        .arg(profile.port.to_string())
        .arg("-U")
        .arg(&profile.username)
        .arg("-d")
        .arg(&profile.database)
        .arg("--format=plain")
        .arg("--file")
        .arg(&path);
    if let Some(password) = &profile.password {
        cmd.env("PGPASSWORD", password);
    }

    debug!(pg_dump = %config.pg_dump.display(), path = %path.display(), "running pg_dump");
    let output = cmd.output().await.map_err(|e| {
        UpdateError::Backup(format!(
            "cannot run {}: {}",
            config.pg_dump.display(),
            e
        ))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(UpdateError::Backup(format!(
            "pg_dump exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    if !path.is_file() {
        return Err(UpdateError::Backup(format!(
            "pg_dump reported success but {} was not written",
            path.display()
        )));
    }

    info!(path = %path.display(), "backup written");
    Ok(BackupHandle { path, created_at })
}

fn ensure_dir(dir: &Path) -> UpdateResult<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| {
            UpdateError::Backup(format!("cannot create {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}
