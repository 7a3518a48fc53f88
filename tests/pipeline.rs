use pg_safe_update::prelude::*;
use pretty_assertions::assert_eq;

fn strict() -> AdmissionPolicy {
    AdmissionPolicy::default()
}

/// Statement sink that fails on one position and records the rest.
struct FlakyTarget {
    fail_at: usize,
    calls: usize,
    applied: Vec<String>,
}

impl FlakyTarget {
    fn failing_at(fail_at: usize) -> Self {
        Self {
            fail_at,
            calls: 0,
            applied: Vec::new(),
        }
    }
}

impl SqlTarget for FlakyTarget {
    async fn run(&mut self, sql: &str) -> Result<(), String> {
        self.calls += 1;
        if self.calls == self.fail_at {
            return Err("syntax error at or near \"TABEL\"".to_string());
        }
        self.applied.push(sql.to_string());
        Ok(())
    }
}

#[test]
fn test_duplicate_create_in_one_file() {
    let mut existing = ExistingObjectSet::new("public");
    let plan = plan_schema(
        "CREATE TABLE t (id int); CREATE TABLE t (id int);",
        &mut existing,
        &strict(),
    )
    .unwrap();

    assert_eq!(plan.extracted_count(), 2);
    assert!(plan.statements[0].is_admitted());
    assert_eq!(
        plan.statements[0].sql(),
        Some("CREATE TABLE IF NOT EXISTS t (id int)")
    );
    assert_eq!(
        plan.statements[1].decision,
        Decision::Reject {
            reason: RejectReason::Duplicate {
                object: "table public.t".to_string(),
                position: 1,
            }
        }
    );
}

#[test]
fn test_existing_index_is_skipped() {
    let mut existing = ExistingObjectSet::new("public").with(ObjectRef::new(
        ObjectKind::Index,
        QualifiedName::new("public", "idx"),
    ));
    let plan = plan_schema("CREATE INDEX idx ON t(id);", &mut existing, &strict()).unwrap();

    assert_eq!(plan.extracted_count(), 1);
    assert_eq!(plan.admitted_count(), 0);
    assert!(plan.is_up_to_date());
    assert_eq!(
        plan.statements[0].decision,
        Decision::Reject {
            reason: RejectReason::Exists {
                object: "index public.idx".to_string()
            }
        }
    );
}

#[test]
fn test_unterminated_literal_extracts_nothing() {
    let source = "CREATE TABLE a (id int);\nINSERT INTO a VALUES ('never closed);\n";
    assert!(matches!(
        extract_statements(source),
        Err(UpdateError::Parse { line: 2, .. })
    ));

    let mut existing = ExistingObjectSet::new("public");
    let err = plan_schema(source, &mut existing, &strict()).unwrap_err();
    assert_eq!(err.exit_code(), 4);
    assert!(existing.is_empty());
}

#[tokio::test]
async fn test_failure_stops_the_run() {
    let mut existing = ExistingObjectSet::new("public");
    let plan = plan_schema(
        "INSERT INTO log VALUES (1);\nCREATE TABEL broken (id int);\nINSERT INTO log VALUES (3);",
        &mut existing,
        &strict(),
    )
    .unwrap();
    assert_eq!(plan.admitted_count(), 3);

    let mut target = FlakyTarget::failing_at(2);
    let err = apply_plan(&mut target, &plan, |_| {}).await.unwrap_err();

    assert_eq!(target.applied, vec!["INSERT INTO log VALUES (1)"]);
    assert_eq!(target.calls, 2);
    match err {
        UpdateError::Execution {
            position,
            statement,
            ..
        } => {
            assert_eq!(position, 2);
            assert_eq!(statement, "CREATE TABEL broken (id int)");
        }
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[test]
fn test_existing_targets_never_run_verbatim() {
    let mut existing = ExistingObjectSet::new("public")
        .with(ObjectRef::new(ObjectKind::Table, QualifiedName::bare("users")))
        .with(ObjectRef::new(ObjectKind::Sequence, QualifiedName::new("app", "ids")))
        .with(ObjectRef::new(ObjectKind::Type, QualifiedName::bare("mood")))
        .with(ObjectRef::on_table(
            ObjectKind::Trigger,
            "audit",
            QualifiedName::bare("users"),
        ));

    let plan = plan_schema(
        "CREATE TABLE users (id int);\n\
         CREATE TABLE IF NOT EXISTS public.users (id int);\n\
         CREATE SEQUENCE app.ids;\n\
         CREATE TYPE mood AS ENUM ('ok');\n\
         CREATE TRIGGER audit AFTER INSERT ON users FOR EACH ROW EXECUTE FUNCTION log();",
        &mut existing,
        &strict(),
    )
    .unwrap();

    for statement in &plan.statements {
        assert_ne!(statement.decision, Decision::Admit, "#{}", statement.position);
        assert!(!statement.is_admitted());
    }
}

#[test]
fn test_no_object_is_created_twice() {
    let mut existing = ExistingObjectSet::new("public");
    let plan = plan_schema(
        "CREATE SCHEMA app;\n\
         CREATE TABLE app.orders (id int);\n\
         CREATE INDEX orders_id ON app.orders (id);\n\
         create table APP.ORDERS (id int);\n\
         CREATE INDEX IF NOT EXISTS orders_id ON app.orders (id);\n\
         CREATE SCHEMA IF NOT EXISTS app;",
        &mut existing,
        &strict(),
    )
    .unwrap();

    let admitted: Vec<usize> = plan.admitted().map(|s| s.position).collect();
    assert_eq!(admitted, vec![1, 2, 3]);

    let mut targets: Vec<&str> = plan
        .admitted()
        .filter_map(|s| s.target.as_deref())
        .collect();
    let before = targets.len();
    targets.sort();
    targets.dedup();
    assert_eq!(targets.len(), before);
}

#[test]
fn test_destructive_statements_need_the_override() {
    let source = "DROP TABLE sessions;\nTRUNCATE audit_log;\nALTER TABLE users DROP COLUMN legacy;";

    let mut existing = ExistingObjectSet::new("public");
    let plan = plan_schema(source, &mut existing, &strict()).unwrap();
    assert_eq!(plan.admitted_count(), 0);
    assert!(plan.rejected().all(|s| s.decision
        == Decision::Reject {
            reason: RejectReason::Destructive
        }));

    let mut existing = ExistingObjectSet::new("public");
    let plan = plan_schema(
        source,
        &mut existing,
        &AdmissionPolicy {
            allow_destructive: true,
        },
    )
    .unwrap();
    assert_eq!(plan.admitted_count(), 3);
    assert_eq!(plan.overridden().count(), 3);
}

#[test]
fn test_rebuilt_objects_after_override() {
    let mut existing = ExistingObjectSet::new("public")
        .with(ObjectRef::new(ObjectKind::Table, QualifiedName::bare("t")))
        .with(ObjectRef::on_table(
            ObjectKind::Index,
            "t_idx",
            QualifiedName::bare("t"),
        ))
        .with(ObjectRef::on_table(
            ObjectKind::Constraint,
            "t_pk",
            QualifiedName::bare("t"),
        ));
    let plan = plan_schema(
        "ALTER TABLE t DROP CONSTRAINT t_pk;\n\
         ALTER TABLE t ADD CONSTRAINT t_pk PRIMARY KEY (id);\n\
         DROP TABLE t;\n\
         CREATE TABLE t (id int);\n\
         CREATE INDEX t_idx ON t (id);",
        &mut existing,
        &AdmissionPolicy {
            allow_destructive: true,
        },
    )
    .unwrap();

    let admitted: Vec<usize> = plan.admitted().map(|s| s.position).collect();
    assert_eq!(admitted, vec![1, 2, 3, 4, 5]);
    let overridden: Vec<usize> = plan.overridden().map(|s| s.position).collect();
    assert_eq!(overridden, vec![1, 3]);
    assert_eq!(
        plan.statements[4].sql(),
        Some("CREATE INDEX IF NOT EXISTS t_idx ON t (id)")
    );
}

#[test]
fn test_function_bodies_and_redefinitions() {
    let mut existing = ExistingObjectSet::new("public").with(ObjectRef::new(
        ObjectKind::Function,
        QualifiedName::bare("touch_updated_at"),
    ));
    let source = "\
-- keep updated_at current
CREATE OR REPLACE FUNCTION touch_updated_at() RETURNS trigger AS $$
BEGIN
    NEW.updated_at := now(); -- ; inside a body
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TABLE posts (id serial PRIMARY KEY, updated_at timestamptz);
CREATE TRIGGER posts_touch BEFORE UPDATE ON posts
    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
";
    let plan = plan_schema(source, &mut existing, &strict()).unwrap();
    assert_eq!(plan.extracted_count(), 3);
    assert_eq!(plan.admitted_count(), 3);
    assert_eq!(plan.statements[0].decision, Decision::Admit);
    assert_eq!(plan.statements[0].kind, "CREATE OR REPLACE FUNCTION");
    assert_eq!(
        plan.statements[2].target.as_deref(),
        Some("trigger posts_touch on public.posts")
    );
}

#[test]
fn test_extraction_round_trips() {
    let source = "CREATE TABLE notes (body text DEFAULT 'a;b');\n\
                  /* header; */ CREATE INDEX notes_body ON notes (body);\n\
                  DO $x$ BEGIN RAISE NOTICE 'hi;'; END $x$;\n\
                  COMMENT ON TABLE notes IS 'it''s; fine'";
    let first: Vec<String> = extract_statements(source)
        .unwrap()
        .into_iter()
        .map(|s| s.text)
        .collect();
    let rejoined = format!("{};", first.join(";\n"));
    let second: Vec<String> = extract_statements(&rejoined)
        .unwrap()
        .into_iter()
        .map(|s| s.text)
        .collect();
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}
