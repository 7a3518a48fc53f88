//! Error types for pg-safe-update.

use thiserror::Error;

/// The main error type for a schema update run.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Missing or malformed credentials / settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server could not be reached or rejected the login.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The schema file could not be split into statements.
    #[error("Parse error at line {line}, column {column} (offset {offset}): {message}")]
    Parse {
        offset: usize,
        line: usize,
        column: usize,
        message: String,
    },

    /// A catalog query failed after the connection was established.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// An admitted statement failed when applied.
    #[error("Execution error in statement #{position}: {message}\n  {statement}")]
    Execution {
        position: usize,
        statement: String,
        message: String,
    },

    /// The pre-update snapshot could not be taken.
    #[error("Backup error: {0}")]
    Backup(String),

    /// The operator declined the plan.
    #[error("Update cancelled")]
    Aborted,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Create a parse error at a byte offset of `source`.
    pub fn parse(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        Self::Parse {
            offset,
            line,
            column,
            message: message.into(),
        }
    }

    /// Create an execution error for the statement at `position`.
    pub fn execution(position: usize, statement: &str, message: impl Into<String>) -> Self {
        Self::Execution {
            position,
            statement: statement.to_string(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Connection(_) => 3,
            Self::Parse { .. } => 4,
            Self::Execution { .. } | Self::Catalog(_) => 5,
            Self::Backup(_) => 6,
            Self::Aborted | Self::Io(_) => 1,
        }
    }
}

/// 1-based line and column of a byte offset.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}

/// Result type alias for pg-safe-update operations.
pub type UpdateResult<T> = Result<T, UpdateError>;
