use std::borrow::Cow;
use std::fmt::Write;

use super::tokens::Token;
use crate::value::Value;

/// A SQL chunk represents a part of an SQL statement.
///
/// - `Token` - SQL keywords and operators (SELECT, FROM, =, etc.)
/// - `Ident` - Quoted identifiers ("table_name", "column_name")
/// - `Raw` - Unquoted raw SQL text
/// - `Number` - Unsigned integer literal (LIMIT, OFFSET)
/// - `Param` - `?` placeholder bound to a value
/// - `Func` - Function name, glued to the following parenthesis
/// - `Literal` - Raw SQL carrying its own `?` arguments
#[derive(Debug, Clone, PartialEq)]
pub enum SQLChunk<'a> {
    /// Renders as: keyword with automatic spacing rules
    Token(Token),

    /// Renders as: "name" (with quotes, embedded quotes doubled)
    Ident(Cow<'a, str>),

    /// Renders as: text (no quotes, as-is)
    Raw(Cow<'a, str>),

    /// Renders as: decimal digits
    Number(usize),

    /// Renders as: ?
    Param(Value),

    /// Renders as: NAME, with no space before the following `(`
    Func(Cow<'a, str>),

    /// Renders as: text (as-is); arguments are collected in order
    Literal { sql: Cow<'a, str>, arguments: Vec<Value> },
}

impl<'a> SQLChunk<'a> {
    /// Creates a quoted identifier from a runtime string
    #[inline]
    pub fn ident(name: impl Into<Cow<'a, str>>) -> Self {
        Self::Ident(name.into())
    }

    /// Creates raw SQL text from a runtime string
    #[inline]
    pub fn raw(text: impl Into<Cow<'a, str>>) -> Self {
        Self::Raw(text.into())
    }

    /// Write chunk content to buffer
    pub(crate) fn write(&self, buf: &mut impl Write) {
        match self {
            SQLChunk::Token(token) => {
                let _ = buf.write_str(token.as_str());
            }
            SQLChunk::Ident(name) => write_quoted(buf, name),
            SQLChunk::Raw(text) | SQLChunk::Func(text) => {
                let _ = buf.write_str(text);
            }
            SQLChunk::Literal { sql, .. } => {
                let _ = buf.write_str(sql);
            }
            SQLChunk::Number(n) => {
                let _ = write!(buf, "{n}");
            }
            SQLChunk::Param(_) => {
                let _ = buf.write_char('?');
            }
        }
    }
}

/// Writes `name` as a double-quoted SQLite identifier.
pub(crate) fn write_quoted(buf: &mut impl Write, name: &str) {
    let _ = buf.write_char('"');
    if name.contains('"') {
        let _ = buf.write_str(&name.replace('"', "\"\""));
    } else {
        let _ = buf.write_str(name);
    }
    let _ = buf.write_char('"');
}

/// Canonical spacing logic for SQL chunk rendering.
pub(crate) fn chunk_needs_space(current: &SQLChunk<'_>, next: &SQLChunk<'_>) -> bool {
    match (current, next) {
        // No space before closing/separator punctuation
        (_, SQLChunk::Token(Token::RPAREN | Token::COMMA | Token::DOT)) => false,
        // No space after opening punctuation
        (SQLChunk::Token(Token::LPAREN | Token::DOT), _) => false,
        // Function names hug their argument list
        (SQLChunk::Func(_), SQLChunk::Token(Token::LPAREN)) => false,
        _ => true,
    }
}

impl<'a> From<Token> for SQLChunk<'a> {
    #[inline]
    fn from(value: Token) -> Self {
        Self::Token(value)
    }
}

impl<'a> From<Value> for SQLChunk<'a> {
    #[inline]
    fn from(value: Value) -> Self {
        Self::Param(value)
    }
}
