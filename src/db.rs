//! Connections and target-database creation.

use sqlx::{Connection, Executor, PgConnection};
use tracing::{debug, info};

use crate::config::{ConnectionProfile, MAINTENANCE_DATABASE};
use crate::error::{UpdateError, UpdateResult};

/// Open a connection to the profile's database.
pub async fn connect(profile: &ConnectionProfile) -> UpdateResult<PgConnection> {
    debug!(url = %profile.redacted_url(), "connecting");
    PgConnection::connect_with(&profile.connect_options())
        .await
        .map_err(|e| {
            UpdateError::Connection(format!("{}: {}", profile.redacted_url(), e))
        })
}

/// Whether a database named `name` exists on the server.
pub async fn database_exists(conn: &mut PgConnection, name: &str) -> UpdateResult<bool> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| UpdateError::Catalog(format!("database lookup failed: {}", e)))
}

/// Whether the profile's database exists, checked from the maintenance
/// database.
pub async fn target_database_exists(profile: &ConnectionProfile) -> UpdateResult<bool> {
    let mut conn = connect(&profile.with_database(MAINTENANCE_DATABASE)).await?;
    let exists = database_exists(&mut conn, &profile.database).await?;
    conn.close().await.ok();
    Ok(exists)
}

/// Create the profile's database unless it already exists.
///
/// Returns whether a database was created.
pub async fn ensure_database(profile: &ConnectionProfile) -> UpdateResult<bool> {
    let mut conn = connect(&profile.with_database(MAINTENANCE_DATABASE)).await?;

    if database_exists(&mut conn, &profile.database).await? {
        debug!(database = %profile.database, "database exists");
        conn.close().await.ok();
        return Ok(false);
    }

    let ddl = format!("CREATE DATABASE {}", quote_ident(&profile.database));
    conn.execute(ddl.as_str()).await.map_err(|e| {
        UpdateError::Connection(format!(
            "cannot create database {}: {}",
            profile.database, e
        ))
    })?;
    info!(database = %profile.database, "database created");
    conn.close().await.ok();
    Ok(true)
}

/// Quote an identifier for interpolation into DDL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
