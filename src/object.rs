//! Database object identities.

use serde::Serialize;
use std::fmt;

/// Kinds of schema objects whose existence is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Schema,
    Extension,
    Type,
    Table,
    Sequence,
    View,
    MaterializedView,
    Index,
    Constraint,
    Function,
    Trigger,
    Policy,
}

impl ObjectKind {
    /// SQL keyword(s) naming the kind.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Schema => "SCHEMA",
            Self::Extension => "EXTENSION",
            Self::Type => "TYPE",
            Self::Table => "TABLE",
            Self::Sequence => "SEQUENCE",
            Self::View => "VIEW",
            Self::MaterializedView => "MATERIALIZED VIEW",
            Self::Index => "INDEX",
            Self::Constraint => "CONSTRAINT",
            Self::Function => "FUNCTION",
            Self::Trigger => "TRIGGER",
            Self::Policy => "POLICY",
        }
    }

    /// PostgreSQL accepts `CREATE <kind> IF NOT EXISTS` for this kind.
    pub fn supports_if_not_exists(&self) -> bool {
        matches!(
            self,
            Self::Schema
                | Self::Extension
                | Self::Table
                | Self::Sequence
                | Self::MaterializedView
                | Self::Index
        )
    }

    /// Names are unique per schema (schemas and extensions are database-wide).
    pub fn is_schema_scoped(&self) -> bool {
        !matches!(self, Self::Schema | Self::Extension)
    }

    /// Names are unique per table.
    pub fn is_table_scoped(&self) -> bool {
        matches!(self, Self::Constraint | Self::Trigger | Self::Policy)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keyword().to_lowercase())
    }
}

/// A possibly schema-qualified identifier, already case-folded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// An unqualified name.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Fill in `default_schema` when no schema was written.
    pub fn or_schema(&self, default_schema: &str) -> Self {
        Self {
            schema: Some(
                self.schema
                    .clone()
                    .unwrap_or_else(|| default_schema.to_string()),
            ),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A named object of a given kind, with its owning table when the kind is
/// table-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: QualifiedName,
    pub table: Option<QualifiedName>,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, name: QualifiedName) -> Self {
        Self {
            kind,
            name,
            table: None,
        }
    }

    /// A constraint, trigger or policy on `table`.
    pub fn on_table(kind: ObjectKind, name: impl Into<String>, table: QualifiedName) -> Self {
        Self {
            kind,
            name: QualifiedName::bare(name),
            table: Some(table),
        }
    }

    /// Canonical form used as a set key: every schema spelled out.
    pub fn normalized(&self, default_schema: &str) -> Self {
        if !self.kind.is_schema_scoped() {
            return Self::new(self.kind, QualifiedName::bare(self.name.name.clone()));
        }

        if self.kind.is_table_scoped() {
            if let Some(table) = &self.table {
                let table = table.or_schema(default_schema);
                return Self {
                    kind: self.kind,
                    name: QualifiedName {
                        schema: table.schema.clone(),
                        name: self.name.name.clone(),
                    },
                    table: Some(table),
                };
            }
        }

        Self {
            kind: self.kind,
            name: self.name.or_schema(default_schema),
            table: None,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{} {} on {}", self.kind, self.name.name, table),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}
