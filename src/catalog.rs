//! Existing-object lookup.
//!
//! [`ExistingObjectSet`] is a per-run snapshot of what the target database
//! already contains. It is built from the live catalog by [`inspect`], or by
//! hand in tests, and then updated by admission as statements are accepted.

use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{UpdateError, UpdateResult};
use crate::object::{ObjectKind, ObjectRef, QualifiedName};

/// Where a known object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Present in the database before the run.
    Catalog,
    /// Admitted earlier in this run, at the given statement position.
    Statement(usize),
}

#[derive(Debug, Clone)]
struct Entry {
    origin: Origin,
    /// Relation the object lives on (indexes, constraints, triggers, policies).
    owner: Option<QualifiedName>,
}

/// Objects known to exist in the target database.
#[derive(Debug, Clone)]
pub struct ExistingObjectSet {
    default_schema: String,
    objects: HashMap<ObjectRef, Entry>,
}

impl ExistingObjectSet {
    /// Empty set. Unqualified names resolve to `default_schema`.
    pub fn new(default_schema: impl Into<String>) -> Self {
        Self {
            default_schema: default_schema.into(),
            objects: HashMap::new(),
        }
    }

    /// Builder-style insert of a pre-existing object.
    pub fn with(mut self, object: ObjectRef) -> Self {
        self.insert_existing(object);
        self
    }

    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    /// Canonical form of `object` in this set.
    pub fn qualify(&self, object: &ObjectRef) -> ObjectRef {
        object.normalized(&self.default_schema)
    }

    fn entry(&self, object: &ObjectRef, origin: Origin) -> Entry {
        Entry {
            origin,
            owner: object
                .table
                .as_ref()
                .map(|t| t.or_schema(&self.default_schema)),
        }
    }

    /// Record an object found in the catalog.
    pub fn insert_existing(&mut self, object: ObjectRef) {
        let key = self.qualify(&object);
        let entry = self.entry(&object, Origin::Catalog);
        self.objects.insert(key, entry);
    }

    /// Record an object created by the statement at `position`.
    pub fn record(&mut self, object: &ObjectRef, position: usize) {
        let key = self.qualify(object);
        let entry = self.entry(object, Origin::Statement(position));
        self.objects.entry(key).or_insert(entry);
    }

    /// Forget an object dropped during the run. Dropping a relation also
    /// forgets the indexes, constraints, triggers and policies on it.
    pub fn remove(&mut self, object: &ObjectRef) -> bool {
        let key = self.qualify(object);
        let removed = self.objects.remove(&key).is_some();
        if matches!(
            key.kind,
            ObjectKind::Table | ObjectKind::View | ObjectKind::MaterializedView
        ) {
            self.objects
                .retain(|_, entry| entry.owner.as_ref() != Some(&key.name));
        }
        removed
    }

    pub fn lookup(&self, object: &ObjectRef) -> Option<Origin> {
        self.objects
            .get(&self.qualify(object))
            .map(|entry| entry.origin)
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.lookup(object).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of known objects of `kind`.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.objects.keys().filter(|o| o.kind == kind).count()
    }
}

/// One catalog query per tracked kind. Every query yields
/// `(schema, name, owning table)`.
const CATALOG_QUERIES: &[(ObjectKind, &str)] = &[
    (
        ObjectKind::Schema,
        "SELECT NULL::text, nspname::text, NULL::text FROM pg_namespace \
         WHERE nspname NOT IN ('pg_catalog', 'information_schema') \
         AND nspname NOT LIKE 'pg_toast%' AND nspname NOT LIKE 'pg_temp%'",
    ),
    (
        ObjectKind::Extension,
        "SELECT NULL::text, extname::text, NULL::text FROM pg_extension",
    ),
    (
        ObjectKind::Type,
        "SELECT n.nspname::text, t.typname::text, NULL::text FROM pg_type t \
         JOIN pg_namespace n ON n.oid = t.typnamespace \
         LEFT JOIN pg_class c ON c.oid = t.typrelid \
         WHERE (t.typtype IN ('e', 'd', 'r') OR (t.typtype = 'c' AND c.relkind = 'c')) \
         AND n.nspname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::Table,
        "SELECT schemaname::text, tablename::text, NULL::text FROM pg_tables \
         WHERE schemaname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::Sequence,
        "SELECT schemaname::text, sequencename::text, NULL::text FROM pg_sequences \
         WHERE schemaname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::View,
        "SELECT schemaname::text, viewname::text, NULL::text FROM pg_views \
         WHERE schemaname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::MaterializedView,
        "SELECT schemaname::text, matviewname::text, NULL::text FROM pg_matviews \
         WHERE schemaname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::Index,
        "SELECT schemaname::text, indexname::text, tablename::text FROM pg_indexes \
         WHERE schemaname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::Constraint,
        "SELECT n.nspname::text, con.conname::text, c.relname::text FROM pg_constraint con \
         JOIN pg_class c ON c.oid = con.conrelid \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::Function,
        "SELECT n.nspname::text, p.proname::text, NULL::text FROM pg_proc p \
         JOIN pg_namespace n ON n.oid = p.pronamespace \
         WHERE n.nspname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::Trigger,
        "SELECT n.nspname::text, tg.tgname::text, c.relname::text FROM pg_trigger tg \
         JOIN pg_class c ON c.oid = tg.tgrelid \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         WHERE NOT tg.tgisinternal \
         AND n.nspname NOT IN ('pg_catalog', 'information_schema')",
    ),
    (
        ObjectKind::Policy,
        "SELECT schemaname::text, policyname::text, tablename::text FROM pg_policies \
         WHERE schemaname NOT IN ('pg_catalog', 'information_schema')",
    ),
];

/// Build the existing-object set from the live catalog.
pub async fn inspect(
    conn: &mut PgConnection,
    default_schema: &str,
) -> UpdateResult<ExistingObjectSet> {
    let mut existing = ExistingObjectSet::new(default_schema);

    for (kind, sql) in CATALOG_QUERIES {
        let rows: Vec<(Option<String>, String, Option<String>)> = sqlx::query_as(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| UpdateError::Catalog(format!("{} lookup failed: {}", kind, e)))?;

        debug!(kind = %kind, count = rows.len(), "catalog objects loaded");

        for (schema, name, table) in rows {
            existing.insert_existing(object_from_row(*kind, schema, name, table));
        }
    }

    Ok(existing)
}

fn object_from_row(
    kind: ObjectKind,
    schema: Option<String>,
    name: String,
    table: Option<String>,
) -> ObjectRef {
    let table = table.map(|table| QualifiedName {
        schema: schema.clone(),
        name: table,
    });
    match table {
        Some(table) if kind.is_table_scoped() => ObjectRef::on_table(kind, name, table),
        table => ObjectRef {
            kind,
            name: QualifiedName { schema, name },
            table,
        },
    }
}
