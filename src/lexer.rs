//! SQL lexer built on nom.
//!
//! Only knows as much SQL as statement splitting and head classification
//! need: where literals, quoted identifiers, dollar bodies and comments begin
//! and end. Everything else is a word or a single punctuation character.
//!
//! ```text
//! CREATE TABLE "Odd;Name" (note text DEFAULT 'a;b'); -- trailing; comment
//! ───┬── ──┬── ─────┬──── ┬──┬─ ──┬─ ───┬─── ──┬── ┬ ──────────┬─────────
//!  Word   Word  QuotedIdent │ Word Word  Word  String │      LineComment
//!                        Punct                      Punct
//! ```

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{anychar, char, multispace1, not_line_ending, one_of, satisfy},
    combinator::{opt, recognize, value},
    error::{Error, ErrorKind},
    sequence::{delimited, pair},
};

use crate::error::{UpdateError, UpdateResult};

/// Lexical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    LineComment,
    BlockComment,
    /// Keyword, bare identifier or number.
    Word,
    /// `"identifier"`
    QuotedIdent,
    /// `'literal'` or `E'literal'`
    String,
    /// `$$body$$` or `$tag$body$tag$`
    DollarString,
    Punct,
}

/// A token borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the token in the lexed source.
    pub offset: usize,
}

impl Token<'_> {
    /// Whitespace and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// Case-insensitive keyword match.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.starts_with(c)
    }

    /// Byte offset just past the token.
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Iterator over the tokens of a source string.
///
/// Yields a single parse error and then stops when a literal, identifier,
/// dollar body or block comment is left open.
pub struct Lexer<'a> {
    source: &'a str,
    offset: usize,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = UpdateResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.source.len() {
            return None;
        }

        let input = &self.source[self.offset..];
        match token(input) {
            Ok((rest, kind)) => {
                let len = input.len() - rest.len();
                let tok = Token {
                    kind,
                    text: &input[..len],
                    offset: self.offset,
                };
                self.offset += len;
                Some(Ok(tok))
            }
            Err(_) => {
                self.failed = true;
                Some(Err(UpdateError::parse(
                    self.source,
                    self.offset,
                    unterminated_message(input),
                )))
            }
        }
    }
}

/// Lex a whole source string.
pub fn tokenize(source: &str) -> UpdateResult<Vec<Token<'_>>> {
    Lexer::new(source).collect()
}

/// Parse one token.
fn token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Whitespace, multispace1),
        value(
            TokenKind::LineComment,
            recognize(pair(tag("--"), not_line_ending)),
        ),
        value(TokenKind::BlockComment, block_comment),
        value(TokenKind::String, escape_string),
        value(TokenKind::String, quoted('\'')),
        value(TokenKind::QuotedIdent, quoted('"')),
        value(TokenKind::DollarString, dollar_string),
        value(TokenKind::Word, word),
        value(TokenKind::Punct, anychar),
    ))(input)
}

/// Parse a bare word: keyword, identifier or number.
fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphanumeric() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

/// Parse a `q`-delimited run where a doubled `q` stands for itself.
fn quoted(q: char) -> impl Fn(&str) -> IResult<&str, ()> {
    move |input: &str| {
        let (mut rest, _) = char(q)(input)?;
        loop {
            let Some(close) = rest.find(q) else {
                return Err(unterminated(input));
            };
            let after = &rest[close + q.len_utf8()..];
            if after.starts_with(q) {
                rest = &after[q.len_utf8()..];
            } else {
                return Ok((after, ()));
            }
        }
    }
}

/// Parse an `E'...'` literal, where backslash escapes the next character.
fn escape_string(input: &str) -> IResult<&str, ()> {
    let (rest, _) = pair(one_of("eE"), char('\''))(input)?;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\'' if rest[i + 1..].starts_with('\'') => {
                chars.next();
            }
            '\'' => return Ok((&rest[i + 1..], ())),
            _ => {}
        }
    }
    Err(unterminated(input))
}

/// Parse a dollar tag: `$$` or `$name$`.
fn dollar_tag(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('$'),
        opt(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        char('$'),
    ))(input)
}

/// Parse a dollar-quoted body up to its matching closing tag.
fn dollar_string(input: &str) -> IResult<&str, ()> {
    let (rest, open) = dollar_tag(input)?;
    match rest.find(open) {
        Some(close) => Ok((&rest[close + open.len()..], ())),
        None => Err(unterminated(input)),
    }
}

/// Parse a `/* ... */` comment. Block comments nest.
fn block_comment(input: &str) -> IResult<&str, ()> {
    let (mut rest, _) = tag("/*")(input)?;
    let mut depth = 1usize;
    while depth > 0 {
        if let Some(after) = rest.strip_prefix("/*") {
            depth += 1;
            rest = after;
        } else if let Some(after) = rest.strip_prefix("*/") {
            depth -= 1;
            rest = after;
        } else {
            let mut chars = rest.chars();
            if chars.next().is_none() {
                return Err(unterminated(input));
            }
            rest = chars.as_str();
        }
    }
    Ok((rest, ()))
}

fn unterminated(input: &str) -> nom::Err<Error<&str>> {
    nom::Err::Failure(Error::new(input, ErrorKind::Eof))
}

fn unterminated_message(input: &str) -> &'static str {
    if input.starts_with("/*") {
        "unterminated block comment"
    } else if input.starts_with('"') {
        "unterminated quoted identifier"
    } else if input.starts_with('$') {
        "unterminated dollar-quoted string"
    } else {
        "unterminated string literal"
    }
}
