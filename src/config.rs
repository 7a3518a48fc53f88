//! Connection credentials.
//!
//! Credentials come from a `.env`-style file holding a line like
//!
//! ```text
//! DATABASE_URL=postgres://<username>:<password>@<host>[:<port>]/<dbname>
//! ```

use sqlx::ConnectOptions;
use sqlx::postgres::PgConnectOptions;
use std::path::Path;
use url::Url;

use crate::error::{UpdateError, UpdateResult};

/// Key holding the connection URL.
pub const DATABASE_URL_KEY: &str = "DATABASE_URL";

/// Database the server always has, used to create the target database.
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// Where and as whom to connect. Components are stored decoded.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub database: String,
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionProfile {
    /// Parse a `postgres://` URL.
    pub fn from_url(raw: &str) -> UpdateResult<Self> {
        let url = Url::parse(raw)
            .map_err(|e| UpdateError::Config(format!("invalid {}: {}", DATABASE_URL_KEY, e)))?;

        match url.scheme() {
            "postgres" | "postgresql" => {}
            other => {
                return Err(UpdateError::Config(format!(
                    "unsupported scheme '{}', expected postgres://",
                    other
                )));
            }
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| UpdateError::Config(format!("missing host in {}", DATABASE_URL_KEY)))?
            .to_string();

        let username = if url.username().is_empty() {
            "postgres".to_string()
        } else {
            decode(url.username())?
        };

        let password = url.password().map(decode).transpose()?;

        let database = decode(url.path().trim_start_matches('/'))?;
        if database.is_empty() {
            return Err(UpdateError::Config(format!(
                "missing database name in {}",
                DATABASE_URL_KEY
            )));
        }

        Ok(Self {
            host,
            port: url.port().unwrap_or(5432),
            username,
            password,
            database,
        })
    }

    /// Read `DATABASE_URL` from a key=value file.
    pub fn from_env_file(path: &Path) -> UpdateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UpdateError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let url = read_env_value(&content, DATABASE_URL_KEY).ok_or_else(|| {
            UpdateError::Config(format!(
                "{} not set in {}",
                DATABASE_URL_KEY,
                path.display()
            ))
        })?;
        Self::from_url(&url)
    }

    /// Same server and credentials, different database.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..self.clone()
        }
    }

    /// Connection URL with the password masked, for display.
    pub fn redacted_url(&self) -> String {
        let auth = match &self.password {
            Some(_) => format!("{}:****", urlencoding::encode(&self.username)),
            None => urlencoding::encode(&self.username).into_owned(),
        };
        format!(
            "postgres://{}@{}:{}/{}",
            auth,
            self.host,
            self.port,
            urlencoding::encode(&self.database)
        )
    }

    /// sqlx connect options for this profile.
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.database);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        options.disable_statement_logging()
    }
}

fn decode(component: &str) -> UpdateResult<String> {
    urlencoding::decode(component)
        .map(|s| s.into_owned())
        .map_err(|e| UpdateError::Config(format!("invalid URL encoding: {}", e)))
}

/// Look up `key` in `KEY=value` lines.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
/// and one layer of matching quotes around the value is removed.
pub fn read_env_value(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (k, v) = line.split_once('=')?;
        if k.trim() != key {
            return None;
        }
        Some(unquote(v.trim()).to_string())
    })
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
