//! Statement kinds and head classification.
//!
//! Classification looks only at the leading keywords of a statement and the
//! names that follow them. It is a pure function of the statement text.

use std::fmt;

use crate::lexer::{Token, TokenKind, tokenize};
use crate::object::{ObjectKind, ObjectRef, QualifiedName};

/// What a statement does, as far as admission is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `CREATE <kind> ...`
    Create(ObjectKind),
    /// `CREATE OR REPLACE <kind> ...`
    Replace(ObjectKind),
    /// `ALTER ...` that removes nothing.
    Alter,
    /// `ALTER TABLE ... DROP ...` and friends.
    AlterDrop,
    Drop,
    Truncate,
    /// Queries and DML.
    Data,
    /// Grants, comments, session and maintenance commands.
    Utility,
    /// Not recognized.
    Other,
}

impl StatementKind {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }

    /// Statements that can lose data.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::AlterDrop | Self::Drop | Self::Truncate)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(kind) => write!(f, "CREATE {}", kind.keyword()),
            Self::Replace(kind) => write!(f, "CREATE OR REPLACE {}", kind.keyword()),
            Self::Alter => f.write_str("ALTER"),
            Self::AlterDrop => f.write_str("ALTER ... DROP"),
            Self::Drop => f.write_str("DROP"),
            Self::Truncate => f.write_str("TRUNCATE"),
            Self::Data => f.write_str("DATA"),
            Self::Utility => f.write_str("UTILITY"),
            Self::Other => f.write_str("OTHER"),
        }
    }
}

/// The classified head of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHead {
    pub kind: StatementKind,
    /// Objects created, replaced, altered or dropped, in statement order.
    pub targets: Vec<ObjectRef>,
    /// Objects the statement removes.
    pub dropped: Vec<ObjectRef>,
    /// `IF NOT EXISTS` / `IF EXISTS` was written.
    pub conditional: bool,
    /// Byte offset where `IF NOT EXISTS ` can be inserted.
    pub rewrite_at: Option<usize>,
}

impl StatementHead {
    fn of(kind: StatementKind) -> Self {
        Self {
            kind,
            targets: Vec::new(),
            dropped: Vec::new(),
            conditional: false,
            rewrite_at: None,
        }
    }

    fn with_targets(kind: StatementKind, targets: Vec<ObjectRef>) -> Self {
        Self {
            targets,
            ..Self::of(kind)
        }
    }

    /// The primary target.
    pub fn target(&self) -> Option<&ObjectRef> {
        self.targets.first()
    }
}

/// One statement extracted from a schema file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// 1-based position in the schema file.
    pub position: usize,
    /// Byte offset of the statement in the schema file.
    pub offset: usize,
    /// Statement text without its terminator or leading comments.
    pub text: String,
    pub head: StatementHead,
}

impl RawStatement {
    pub fn new(position: usize, offset: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let head = classify(&text);
        Self {
            position,
            offset,
            text,
            head,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.head.kind
    }

    pub fn target(&self) -> Option<&ObjectRef> {
        self.head.target()
    }

    /// First line of the statement, shortened for log lines.
    pub fn summary(&self) -> String {
        summarize(&self.text)
    }
}

/// First line of `text`, cut at 100 characters.
pub fn summarize(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim_end();
    let mut summary: String = line.chars().take(100).collect();
    if summary.len() < line.len() || text.trim_end().len() > line.len() {
        summary.push_str(" ...");
    }
    summary
}

/// Classify a single statement by its leading keywords.
pub fn classify(text: &str) -> StatementHead {
    let Ok(tokens) = tokenize(text) else {
        return StatementHead::of(StatementKind::Other);
    };
    let tokens: Vec<Token<'_>> = tokens.into_iter().filter(|t| !t.is_trivia()).collect();
    let mut c = Cursor::new(&tokens);

    if c.eat_keyword("CREATE") {
        classify_create(&mut c)
    } else if c.eat_keyword("ALTER") {
        classify_alter(&mut c)
    } else if c.eat_keyword("DROP") {
        classify_drop(&mut c)
    } else if c.eat_keyword("TRUNCATE") {
        StatementHead::of(StatementKind::Truncate)
    } else if c.eat_any(DATA_KEYWORDS) {
        StatementHead::of(StatementKind::Data)
    } else if c.eat_any(UTILITY_KEYWORDS) {
        StatementHead::of(StatementKind::Utility)
    } else {
        StatementHead::of(StatementKind::Other)
    }
}

const DATA_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "COPY", "WITH", "VALUES", "TABLE",
];

const UTILITY_KEYWORDS: &[&str] = &[
    "COMMENT",
    "GRANT",
    "REVOKE",
    "SET",
    "RESET",
    "DO",
    "BEGIN",
    "START",
    "COMMIT",
    "END",
    "ROLLBACK",
    "SAVEPOINT",
    "RELEASE",
    "ANALYZE",
    "VACUUM",
    "REFRESH",
    "REINDEX",
    "CLUSTER",
    "CALL",
    "LOCK",
    "NOTIFY",
    "SECURITY",
    "DISCARD",
];

/// Modifiers that may sit between CREATE and the object keyword.
const CREATE_MODIFIERS: &[&str] = &[
    "GLOBAL",
    "LOCAL",
    "TEMP",
    "TEMPORARY",
    "UNLOGGED",
    "UNIQUE",
    "RECURSIVE",
    "CONSTRAINT",
    "TRUSTED",
    "PROCEDURAL",
];

fn classify_create(c: &mut Cursor<'_, '_>) -> StatementHead {
    let replace = c.eat_keywords(&["OR", "REPLACE"]);
    while c.eat_any(CREATE_MODIFIERS) {}

    let Some(kind) = object_keyword(c) else {
        return StatementHead::of(StatementKind::Other);
    };
    if kind == ObjectKind::Index {
        c.eat_keyword("CONCURRENTLY");
    }

    let insert_at = c.offset();
    let conditional = c.eat_keywords(&["IF", "NOT", "EXISTS"]);

    let target = match kind {
        ObjectKind::Index => {
            let name = if c.peek_keyword("ON") { None } else { c.ident() };
            c.eat_keyword("ON");
            c.eat_keyword("ONLY");
            let table = c.qualified();
            match (name, table) {
                (Some(name), Some(table)) => Some(ObjectRef {
                    kind,
                    name: QualifiedName {
                        schema: table.schema.clone(),
                        name,
                    },
                    table: Some(table),
                }),
                (Some(name), None) => Some(ObjectRef::new(kind, QualifiedName::bare(name))),
                (None, _) => None,
            }
        }
        ObjectKind::Trigger | ObjectKind::Policy => {
            let name = c.ident();
            c.skip_to_keyword("ON");
            c.eat_keyword("ON");
            c.eat_keyword("ONLY");
            match (name, c.qualified()) {
                (Some(name), Some(table)) => Some(ObjectRef::on_table(kind, name, table)),
                _ => None,
            }
        }
        ObjectKind::Schema => {
            c.eat_keyword("AUTHORIZATION");
            c.ident()
                .map(|name| ObjectRef::new(kind, QualifiedName::bare(name)))
        }
        _ => c.qualified().map(|name| ObjectRef::new(kind, name)),
    };

    let statement_kind = if replace {
        StatementKind::Replace(kind)
    } else {
        StatementKind::Create(kind)
    };
    let rewrite_at = match (&target, conditional, replace) {
        (Some(_), false, false) if kind.supports_if_not_exists() => insert_at,
        _ => None,
    };

    StatementHead {
        kind: statement_kind,
        targets: target.into_iter().collect(),
        dropped: Vec::new(),
        conditional,
        rewrite_at,
    }
}

fn classify_alter(c: &mut Cursor<'_, '_>) -> StatementHead {
    let kind = if c.eat_keyword("TABLE") || c.eat_keywords(&["FOREIGN", "TABLE"]) {
        ObjectKind::Table
    } else if c.eat_keyword("TYPE") {
        ObjectKind::Type
    } else {
        return StatementHead::of(StatementKind::Alter);
    };

    let conditional = c.eat_keywords(&["IF", "EXISTS"]);
    c.eat_keyword("ONLY");
    let Some(table) = c.qualified() else {
        return StatementHead::of(StatementKind::Alter);
    };
    c.eat_punct('*');

    let mut destructive = false;
    let mut added = Vec::new();
    let mut dropped = Vec::new();
    loop {
        if c.eat_keyword("DROP") {
            destructive = true;
            if kind == ObjectKind::Table && c.eat_keyword("CONSTRAINT") {
                c.eat_keywords(&["IF", "EXISTS"]);
                if let Some(name) = c.ident() {
                    dropped.push(ObjectRef::on_table(
                        ObjectKind::Constraint,
                        name,
                        table.clone(),
                    ));
                }
            }
        } else if kind == ObjectKind::Table && c.eat_keywords(&["ADD", "CONSTRAINT"]) {
            if let Some(name) = c.ident() {
                added.push(ObjectRef::on_table(
                    ObjectKind::Constraint,
                    name,
                    table.clone(),
                ));
            }
        }
        if !c.skip_past_punct(',') {
            break;
        }
    }

    let altered = ObjectRef::new(kind, table);
    if destructive {
        // Constraints added alongside a drop follow the altered table.
        let targets = std::iter::once(altered).chain(added).collect();
        StatementHead {
            conditional,
            dropped,
            ..StatementHead::with_targets(StatementKind::AlterDrop, targets)
        }
    } else if !added.is_empty() {
        StatementHead::with_targets(StatementKind::Create(ObjectKind::Constraint), added)
    } else {
        StatementHead {
            conditional,
            ..StatementHead::with_targets(StatementKind::Alter, vec![altered])
        }
    }
}

fn classify_drop(c: &mut Cursor<'_, '_>) -> StatementHead {
    let Some(kind) = object_keyword(c) else {
        return StatementHead::of(StatementKind::Drop);
    };
    if kind == ObjectKind::Index {
        c.eat_keyword("CONCURRENTLY");
    }
    let conditional = c.eat_keywords(&["IF", "EXISTS"]);

    let mut targets = Vec::new();
    if kind.is_table_scoped() {
        let name = c.ident();
        c.eat_keyword("ON");
        if let (Some(name), Some(table)) = (name, c.qualified()) {
            targets.push(ObjectRef::on_table(kind, name, table));
        }
    } else {
        while let Some(name) = c.qualified() {
            targets.push(ObjectRef::new(kind, name));
            c.skip_group();
            if !c.eat_punct(',') {
                break;
            }
        }
    }

    StatementHead {
        conditional,
        dropped: targets.clone(),
        ..StatementHead::with_targets(StatementKind::Drop, targets)
    }
}

/// Parse the keyword(s) naming an object kind.
fn object_keyword(c: &mut Cursor<'_, '_>) -> Option<ObjectKind> {
    let kind = if c.eat_keyword("TABLE") {
        ObjectKind::Table
    } else if c.eat_keyword("INDEX") {
        ObjectKind::Index
    } else if c.eat_keyword("SEQUENCE") {
        ObjectKind::Sequence
    } else if c.eat_keyword("SCHEMA") {
        ObjectKind::Schema
    } else if c.eat_keyword("EXTENSION") {
        ObjectKind::Extension
    } else if c.eat_keywords(&["MATERIALIZED", "VIEW"]) {
        ObjectKind::MaterializedView
    } else if c.eat_keyword("VIEW") {
        ObjectKind::View
    } else if c.eat_any(&["FUNCTION", "PROCEDURE"]) {
        ObjectKind::Function
    } else if c.eat_keyword("TRIGGER") {
        ObjectKind::Trigger
    } else if c.eat_keyword("POLICY") {
        ObjectKind::Policy
    } else if c.eat_any(&["TYPE", "DOMAIN"]) {
        ObjectKind::Type
    } else {
        return None;
    };
    Some(kind)
}

/// Forward-only cursor over significant tokens.
struct Cursor<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn offset(&self) -> Option<usize> {
        self.peek().map(|t| t.offset)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_any(&mut self, keywords: &[&str]) -> bool {
        keywords.iter().any(|kw| self.eat_keyword(kw))
    }

    /// Consume the whole sequence or nothing.
    fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let matches = keywords.iter().enumerate().all(|(i, kw)| {
            self.tokens
                .get(self.pos + i)
                .is_some_and(|t| t.is_keyword(kw))
        });
        if matches {
            self.pos += keywords.len();
        }
        matches
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// An identifier, case-folded unless quoted.
    fn ident(&mut self) -> Option<String> {
        let token = self.peek()?;
        let name = match token.kind {
            TokenKind::Word => token.text.to_lowercase(),
            TokenKind::QuotedIdent => {
                let inner = &token.text[1..token.text.len() - 1];
                inner.replace("\"\"", "\"")
            }
            _ => return None,
        };
        self.pos += 1;
        Some(name)
    }

    /// `name` or `schema.name`.
    fn qualified(&mut self) -> Option<QualifiedName> {
        let first = self.ident()?;
        if self.eat_punct('.') {
            if let Some(name) = self.ident() {
                return Some(QualifiedName::new(first, name));
            }
        }
        Some(QualifiedName::bare(first))
    }

    /// Skip a parenthesized group if one starts here.
    fn skip_group(&mut self) {
        if !self.peek().is_some_and(|t| t.is_punct('(')) {
            return;
        }
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                depth -= 1;
            }
            self.pos += 1;
            if depth == 0 {
                return;
            }
        }
    }

    /// Advance to the next top-level `keyword`, stopping on it.
    fn skip_to_keyword(&mut self, keyword: &str) -> bool {
        while let Some(token) = self.peek() {
            if token.is_keyword(keyword) {
                return true;
            }
            if token.is_punct('(') {
                self.skip_group();
            } else {
                self.pos += 1;
            }
        }
        false
    }

    /// Advance past the next top-level `c`.
    fn skip_past_punct(&mut self, c: char) -> bool {
        while let Some(token) = self.peek() {
            if token.is_punct(c) {
                self.pos += 1;
                return true;
            }
            if token.is_punct('(') {
                self.skip_group();
            } else {
                self.pos += 1;
            }
        }
        false
    }
}
