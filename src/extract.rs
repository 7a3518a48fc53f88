//! Statement extraction.
//!
//! Splits schema text on `;` terminators that sit outside literals, quoted
//! identifiers, dollar bodies and comments. Extraction is all-or-nothing: an
//! unterminated construct anywhere fails the whole file.

use tracing::debug;

use crate::error::UpdateResult;
use crate::lexer::{Lexer, Token};
use crate::statement::RawStatement;

/// Split `source` into statements, in file order.
pub fn extract_statements(source: &str) -> UpdateResult<Vec<RawStatement>> {
    let mut statements = Vec::new();
    let mut span: Option<(usize, usize)> = None;
    let mut atomic = AtomicBody::default();

    for token in Lexer::new(source) {
        let token = token?;
        if token.is_trivia() {
            continue;
        }

        if token.is_punct(';') && !atomic.is_open() {
            if let Some((start, end)) = span.take() {
                push(&mut statements, source, start, end);
            }
            atomic = AtomicBody::default();
            continue;
        }

        atomic.observe(&token);
        span = Some(match span {
            Some((start, _)) => (start, token.end()),
            None => (token.offset, token.end()),
        });
    }

    if let Some((start, end)) = span {
        push(&mut statements, source, start, end);
    }

    debug!(count = statements.len(), "statements extracted");
    Ok(statements)
}

fn push(statements: &mut Vec<RawStatement>, source: &str, start: usize, end: usize) {
    let position = statements.len() + 1;
    statements.push(RawStatement::new(position, start, &source[start..end]));
}

/// Tracks a `BEGIN ATOMIC ... END` function body, whose inner statements
/// carry their own terminators.
#[derive(Debug, Default)]
struct AtomicBody {
    depth: usize,
    after_begin: bool,
}

impl AtomicBody {
    fn is_open(&self) -> bool {
        self.depth > 0
    }

    fn observe(&mut self, token: &Token<'_>) {
        if self.depth > 0 {
            if token.is_keyword("CASE") {
                self.depth += 1;
            } else if token.is_keyword("END") {
                self.depth -= 1;
            }
        } else if self.after_begin && token.is_keyword("ATOMIC") {
            self.depth = 1;
        }
        self.after_begin = token.is_keyword("BEGIN");
    }
}
