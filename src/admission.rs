//! Admission filter.
//!
//! Decides per statement whether it runs verbatim, runs as its conditional
//! `IF NOT EXISTS` form, or is skipped. Rules are checked in order and the
//! first match wins:
//!
//! 1. a creation whose target already exists is rejected;
//! 2. a creation with a conditional form it does not use is rewritten;
//! 3. a destructive statement is rejected unless explicitly allowed;
//! 4. anything else is admitted.
//!
//! Every admitted creation is recorded in the [`ExistingObjectSet`], so a
//! second creation of the same object in one run is rejected by rule 1.
//! Destructive statements admitted under the override take what they drop
//! out of the set.

use serde::Serialize;
use std::fmt;

use crate::catalog::{ExistingObjectSet, Origin};
use crate::object::ObjectKind;
use crate::statement::{RawStatement, StatementKind};

/// Operator switches that change admission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Admit DROP, TRUNCATE and `ALTER ... DROP`.
    pub allow_destructive: bool,
}

/// What happens to one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Run the statement as written.
    Admit,
    /// Run `sql` instead.
    Rewrite { sql: String },
    /// Skip the statement.
    Reject { reason: RejectReason },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Reject { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Present in the database before the run.
    Exists { object: String },
    /// Already created by an earlier statement of this run.
    Duplicate { object: String, position: usize },
    /// Would drop or truncate data.
    Destructive,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists { object } => write!(f, "{} already exists", object),
            Self::Duplicate { object, position } => {
                write!(f, "{} already created by statement #{}", object, position)
            }
            Self::Destructive => {
                f.write_str("destructive statement (use --allow-destructive to run it)")
            }
        }
    }
}

/// Decision for one statement plus the review flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub decision: Decision,
    /// Statement kind was not recognized; admitted but worth a look.
    pub flagged: bool,
    /// Destructive, admitted only because the policy allows it.
    pub overridden: bool,
}

impl Admission {
    fn of(decision: Decision) -> Self {
        Self {
            decision,
            flagged: false,
            overridden: false,
        }
    }
}

/// Decide the fate of `statement`, updating `existing` with what it creates
/// or drops.
pub fn admit(
    existing: &mut ExistingObjectSet,
    statement: &RawStatement,
    policy: &AdmissionPolicy,
) -> Admission {
    let head = &statement.head;

    match head.kind {
        StatementKind::Create(_) => {
            if head.targets.is_empty() {
                return Admission::of(Decision::Admit);
            }

            for target in &head.targets {
                if let Some(origin) = existing.lookup(target) {
                    let object = existing.qualify(target).to_string();
                    let reason = match origin {
                        Origin::Catalog => RejectReason::Exists { object },
                        Origin::Statement(position) => {
                            RejectReason::Duplicate { object, position }
                        }
                    };
                    return Admission::of(Decision::Reject { reason });
                }
            }

            for target in &head.targets {
                existing.record(target, statement.position);
            }
            match head.rewrite_at {
                Some(at) => Admission::of(Decision::Rewrite {
                    sql: rewrite_conditional(&statement.text, at),
                }),
                None => Admission::of(Decision::Admit),
            }
        }
        StatementKind::Replace(_) => {
            if let Some(target) = head.target() {
                existing.record(target, statement.position);
            }
            Admission::of(Decision::Admit)
        }
        kind if kind.is_destructive() => {
            if !policy.allow_destructive {
                return Admission::of(Decision::Reject {
                    reason: RejectReason::Destructive,
                });
            }
            for target in &head.dropped {
                existing.remove(target);
            }
            for target in head
                .targets
                .iter()
                .filter(|t| t.kind == ObjectKind::Constraint)
            {
                existing.record(target, statement.position);
            }
            Admission {
                overridden: true,
                ..Admission::of(Decision::Admit)
            }
        }
        StatementKind::Other => Admission {
            flagged: true,
            ..Admission::of(Decision::Admit)
        },
        _ => Admission::of(Decision::Admit),
    }
}

/// Insert `IF NOT EXISTS ` at byte offset `at` of `sql`.
pub fn rewrite_conditional(sql: &str, at: usize) -> String {
    format!("{}IF NOT EXISTS {}", &sql[..at], &sql[at..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectRef, QualifiedName};
    use pretty_assertions::assert_eq;

    const STRICT: AdmissionPolicy = AdmissionPolicy {
        allow_destructive: false,
    };

    fn stmt(position: usize, sql: &str) -> RawStatement {
        RawStatement::new(position, 0, sql)
    }

    fn table(name: &str) -> ObjectRef {
        ObjectRef::new(ObjectKind::Table, QualifiedName::bare(name))
    }

    #[test]
    fn test_rewrite_new_table() {
        let mut set = ExistingObjectSet::new("public");
        let admission = admit(&mut set, &stmt(1, "CREATE TABLE users (id int)"), &STRICT);
        assert_eq!(
            admission.decision,
            Decision::Rewrite {
                sql: "CREATE TABLE IF NOT EXISTS users (id int)".to_string()
            }
        );
        assert!(!admission.flagged);
        assert_eq!(set.lookup(&table("users")), Some(Origin::Statement(1)));
    }

    #[test]
    fn test_reject_existing_table() {
        let mut set = ExistingObjectSet::new("public").with(table("users"));
        let admission = admit(&mut set, &stmt(1, "CREATE TABLE users (id int)"), &STRICT);
        assert_eq!(
            admission.decision,
            Decision::Reject {
                reason: RejectReason::Exists {
                    object: "table public.users".to_string()
                }
            }
        );
    }

    #[test]
    fn test_reject_existing_even_when_conditional() {
        let mut set = ExistingObjectSet::new("public").with(table("users"));
        let admission = admit(
            &mut set,
            &stmt(1, "CREATE TABLE IF NOT EXISTS users (id int)"),
            &STRICT,
        );
        assert!(!admission.decision.is_admitted());
    }

    #[test]
    fn test_conditional_create_is_admitted_verbatim() {
        let mut set = ExistingObjectSet::new("public");
        let admission = admit(
            &mut set,
            &stmt(1, "CREATE INDEX IF NOT EXISTS idx ON t (id)"),
            &STRICT,
        );
        assert_eq!(admission.decision, Decision::Admit);
        assert_eq!(set.count(ObjectKind::Index), 1);
    }

    #[test]
    fn test_duplicate_within_run() {
        let mut set = ExistingObjectSet::new("public");
        admit(&mut set, &stmt(1, "CREATE TYPE mood AS ENUM ('ok')"), &STRICT);
        let second = admit(&mut set, &stmt(2, "CREATE TYPE public.mood AS ENUM ('ok')"), &STRICT);
        assert_eq!(
            second.decision,
            Decision::Reject {
                reason: RejectReason::Duplicate {
                    object: "type public.mood".to_string(),
                    position: 1
                }
            }
        );
    }

    #[test]
    fn test_create_type_admitted_without_rewrite() {
        let mut set = ExistingObjectSet::new("public");
        let admission = admit(&mut set, &stmt(1, "CREATE TYPE mood AS ENUM ('ok')"), &STRICT);
        assert_eq!(admission.decision, Decision::Admit);
    }

    #[test]
    fn test_replace_admitted_over_existing() {
        let function = ObjectRef::new(ObjectKind::Function, QualifiedName::bare("touch"));
        let mut set = ExistingObjectSet::new("public").with(function.clone());
        let admission = admit(
            &mut set,
            &stmt(1, "CREATE OR REPLACE FUNCTION touch() RETURNS int AS $$ SELECT 1 $$ LANGUAGE sql"),
            &STRICT,
        );
        assert_eq!(admission.decision, Decision::Admit);
        assert_eq!(set.lookup(&function), Some(Origin::Catalog));
    }

    #[test]
    fn test_destructive_rejected_by_default() {
        let mut set = ExistingObjectSet::new("public").with(table("t"));
        for sql in [
            "DROP TABLE t",
            "DROP TABLE IF EXISTS t",
            "TRUNCATE t",
            "ALTER TABLE t DROP COLUMN c",
        ] {
            let admission = admit(&mut set, &stmt(1, sql), &STRICT);
            assert_eq!(
                admission.decision,
                Decision::Reject {
                    reason: RejectReason::Destructive
                },
                "{sql}"
            );
        }
        assert!(set.contains(&table("t")));
    }

    #[test]
    fn test_destructive_override_drops_from_set() {
        let policy = AdmissionPolicy {
            allow_destructive: true,
        };
        let mut set = ExistingObjectSet::new("public").with(table("t"));
        let drop = admit(&mut set, &stmt(1, "DROP TABLE t"), &policy);
        assert_eq!(drop.decision, Decision::Admit);
        assert!(drop.overridden);
        assert!(!set.contains(&table("t")));

        let create = admit(&mut set, &stmt(2, "CREATE TABLE t (id int)"), &policy);
        assert!(matches!(create.decision, Decision::Rewrite { .. }));
    }

    #[test]
    fn test_dropped_constraint_can_be_added_back() {
        let policy = AdmissionPolicy {
            allow_destructive: true,
        };
        let fk = ObjectRef::on_table(ObjectKind::Constraint, "orders_fk", QualifiedName::bare("orders"));
        let mut set = ExistingObjectSet::new("public").with(fk.clone());

        let drop = admit(
            &mut set,
            &stmt(1, "ALTER TABLE orders DROP CONSTRAINT orders_fk"),
            &policy,
        );
        assert_eq!(drop.decision, Decision::Admit);
        assert!(drop.overridden);
        assert!(!set.contains(&fk));

        let add = admit(
            &mut set,
            &stmt(
                2,
                "ALTER TABLE orders ADD CONSTRAINT orders_fk FOREIGN KEY (u) REFERENCES users (id)",
            ),
            &policy,
        );
        assert_eq!(add.decision, Decision::Admit);
        assert_eq!(set.lookup(&fk), Some(Origin::Statement(2)));
    }

    #[test]
    fn test_drop_and_add_in_one_statement_keeps_constraint() {
        let policy = AdmissionPolicy {
            allow_destructive: true,
        };
        let check = ObjectRef::on_table(ObjectKind::Constraint, "t_check", QualifiedName::bare("t"));
        let mut set = ExistingObjectSet::new("public").with(check.clone());
        admit(
            &mut set,
            &stmt(1, "ALTER TABLE t DROP CONSTRAINT t_check, ADD CONSTRAINT t_check CHECK (x > 1)"),
            &policy,
        );
        assert_eq!(set.lookup(&check), Some(Origin::Statement(1)));
    }

    #[test]
    fn test_dropped_table_takes_its_index_along() {
        let policy = AdmissionPolicy {
            allow_destructive: true,
        };
        let index = ObjectRef {
            kind: ObjectKind::Index,
            name: QualifiedName::new("public", "t_idx"),
            table: Some(QualifiedName::new("public", "t")),
        };
        let mut set = ExistingObjectSet::new("public").with(table("t")).with(index);

        admit(&mut set, &stmt(1, "DROP TABLE t"), &policy);
        admit(&mut set, &stmt(2, "CREATE TABLE t (id int)"), &policy);
        let recreate = admit(&mut set, &stmt(3, "CREATE INDEX t_idx ON t (id)"), &policy);
        assert_eq!(
            recreate.decision,
            Decision::Rewrite {
                sql: "CREATE INDEX IF NOT EXISTS t_idx ON t (id)".to_string()
            }
        );
    }

    #[test]
    fn test_later_constraint_clause_is_checked() {
        let check = ObjectRef::on_table(ObjectKind::Constraint, "t_x_check", QualifiedName::bare("t"));
        let mut set = ExistingObjectSet::new("public").with(check);
        let admission = admit(
            &mut set,
            &stmt(1, "ALTER TABLE t ADD COLUMN x int, ADD CONSTRAINT t_x_check CHECK (x > 0)"),
            &STRICT,
        );
        assert!(!admission.decision.is_admitted());
    }

    #[test]
    fn test_unknown_is_admitted_and_flagged() {
        let mut set = ExistingObjectSet::new("public");
        let admission = admit(&mut set, &stmt(1, "CREATE ROLE reader"), &STRICT);
        assert_eq!(admission.decision, Decision::Admit);
        assert!(admission.flagged);
    }

    #[test]
    fn test_data_and_alter_admitted() {
        let mut set = ExistingObjectSet::new("public");
        for sql in [
            "INSERT INTO t VALUES (1)",
            "ALTER TABLE t ADD COLUMN c int",
            "GRANT SELECT ON t TO reader",
        ] {
            let admission = admit(&mut set, &stmt(1, sql), &STRICT);
            assert_eq!(admission, Admission::of(Decision::Admit), "{sql}");
        }
    }

    #[test]
    fn test_add_constraint_existing_rejected() {
        let constraint =
            ObjectRef::on_table(ObjectKind::Constraint, "orders_fk", QualifiedName::bare("orders"));
        let mut set = ExistingObjectSet::new("public").with(constraint);
        let admission = admit(
            &mut set,
            &stmt(
                1,
                "ALTER TABLE orders ADD CONSTRAINT orders_fk FOREIGN KEY (u) REFERENCES users (id)",
            ),
            &STRICT,
        );
        assert!(!admission.decision.is_admitted());
    }

    #[test]
    fn test_reject_reason_display() {
        let reason = RejectReason::Duplicate {
            object: "table public.t".to_string(),
            position: 3,
        };
        assert_eq!(
            reason.to_string(),
            "table public.t already created by statement #3"
        );
    }
}
