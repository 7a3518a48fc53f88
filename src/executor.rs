//! Applies admitted statements in file order.

use sqlx::PgConnection;
use tracing::{debug, error};

use crate::error::{UpdateError, UpdateResult};
use crate::plan::{Plan, PlannedStatement};

/// Something statements can be run against.
#[allow(async_fn_in_trait)]
pub trait SqlTarget {
    /// Run one statement, returning the server's message on failure.
    async fn run(&mut self, sql: &str) -> Result<(), String>;
}

impl SqlTarget for PgConnection {
    async fn run(&mut self, sql: &str) -> Result<(), String> {
        sqlx::Executor::execute(&mut *self, sql)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                sqlx::Error::Database(db) => db.message().to_string(),
                other => other.to_string(),
            })
    }
}

/// Progress notifications while applying a plan.
#[derive(Debug)]
pub enum ExecutionEvent<'a> {
    Started(&'a PlannedStatement),
    Applied(&'a PlannedStatement),
    Failed(&'a PlannedStatement, &'a str),
}

/// Positions of the statements that were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub applied: Vec<usize>,
}

/// Apply every admitted statement of `plan`, stopping at the first failure.
///
/// Statements applied before a failure stay applied.
pub async fn apply_plan<T, F>(
    target: &mut T,
    plan: &Plan,
    mut on_event: F,
) -> UpdateResult<ExecutionSummary>
where
    T: SqlTarget,
    F: FnMut(ExecutionEvent<'_>),
{
    let mut summary = ExecutionSummary::default();

    for statement in plan.admitted() {
        let Some(sql) = statement.sql() else {
            continue;
        };

        on_event(ExecutionEvent::Started(statement));
        debug!(position = statement.position, "executing");

        match target.run(sql).await {
            Ok(()) => {
                summary.applied.push(statement.position);
                on_event(ExecutionEvent::Applied(statement));
            }
            Err(message) => {
                error!(position = statement.position, %message, "statement failed");
                on_event(ExecutionEvent::Failed(statement, &message));
                return Err(UpdateError::execution(
                    statement.position,
                    &statement.original,
                    message,
                ));
            }
        }
    }

    Ok(summary)
}
