//! # pg-safe-update
//!
//! Apply a PostgreSQL schema file to a live database without clobbering what
//! is already there.
//!
//! The schema file is split into statements, each statement is checked
//! against the objects the database already has, and only the statements
//! that are safe to run are applied, after a `pg_dump` snapshot.
//!
//! ## Quick Example
//!
//! ```
//! use pg_safe_update::prelude::*;
//!
//! let mut existing = ExistingObjectSet::new("public");
//! let plan = plan_schema(
//!     "CREATE TABLE t (id int); CREATE TABLE t (id int); DROP TABLE old;",
//!     &mut existing,
//!     &AdmissionPolicy::default(),
//! )
//! .unwrap();
//!
//! let sql: Vec<&str> = plan.admitted().filter_map(|s| s.sql()).collect();
//! assert_eq!(sql, vec!["CREATE TABLE IF NOT EXISTS t (id int)"]);
//! ```
//!
//! ## Decisions
//!
//! | Statement                               | Decision              |
//! |-----------------------------------------|-----------------------|
//! | creation of an object that exists       | reject                |
//! | `CREATE TABLE/INDEX/SEQUENCE/...`       | rewrite to `IF NOT EXISTS` |
//! | `CREATE OR REPLACE ...`                 | admit                 |
//! | `DROP`, `TRUNCATE`, `ALTER ... DROP`    | reject (unless allowed) |
//! | anything else                           | admit                 |

pub mod admission;
pub mod backup;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod extract;
pub mod lexer;
pub mod object;
pub mod plan;
pub mod report;
pub mod settings;
pub mod statement;
pub mod update;

pub mod prelude {
    pub use crate::admission::{Admission, AdmissionPolicy, Decision, RejectReason, admit};
    pub use crate::catalog::{ExistingObjectSet, Origin};
    pub use crate::config::ConnectionProfile;
    pub use crate::error::*;
    pub use crate::executor::{ExecutionSummary, SqlTarget, apply_plan};
    pub use crate::extract::extract_statements;
    pub use crate::object::{ObjectKind, ObjectRef, QualifiedName};
    pub use crate::plan::{Plan, PlannedStatement};
    pub use crate::statement::{RawStatement, StatementKind, classify};
    pub use crate::update::{UpdateConfig, UpdateOutcome, plan_schema, run_update};
}

pub use extract::extract_statements;
pub use update::{plan_schema, run_update};
