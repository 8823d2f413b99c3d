mod chunk;
mod tokens;

use std::borrow::Cow;
use std::fmt::{Display, Write};

pub use chunk::*;
use smallvec::SmallVec;
pub use tokens::*;

use crate::value::Value;

/// SQL fragment builder with flat chunk storage.
///
/// Uses `SmallVec<[SQLChunk; 8]>` for inline storage of typical SQL fragments
/// without heap allocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SQL<'a> {
    pub chunks: SmallVec<[SQLChunk<'a>; 8]>,
}

impl<'a> SQL<'a> {
    // ==================== constructors ====================

    /// Creates an empty SQL fragment
    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates SQL with a single token
    #[inline]
    pub fn token(t: Token) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Token(t)],
        }
    }

    /// Creates SQL with a quoted identifier
    #[inline]
    pub fn ident(name: impl Into<Cow<'a, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Ident(name.into())],
        }
    }

    /// Creates SQL with raw text (unquoted)
    #[inline]
    pub fn raw(text: impl Into<Cow<'a, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Raw(text.into())],
        }
    }

    /// Creates SQL with a single unsigned integer literal.
    #[inline]
    pub fn number(value: usize) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Number(value)],
        }
    }

    /// Creates SQL with a single parameter value.
    ///
    /// `NULL` is rendered inline rather than bound.
    #[inline]
    pub fn param(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Self::token(Token::NULL),
            value => Self {
                chunks: smallvec::smallvec![SQLChunk::Param(value)],
            },
        }
    }

    /// Creates raw SQL text that carries its own `?` arguments
    #[inline]
    pub fn literal(sql: impl Into<Cow<'a, str>>, arguments: Vec<Value>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Literal {
                sql: sql.into(),
                arguments,
            }],
        }
    }

    /// Creates SQL for a function call: NAME(args)
    #[inline]
    pub fn func(name: impl Into<Cow<'a, str>>, args: SQL<'a>) -> Self {
        SQL {
            chunks: smallvec::smallvec![SQLChunk::Func(name.into())],
        }
        .push(Token::LPAREN)
        .append(args)
        .push(Token::RPAREN)
    }

    // ==================== builder methods ====================

    /// Append another SQL fragment (flat extend)
    #[inline]
    pub fn append(mut self, other: impl Into<SQL<'a>>) -> Self {
        self.append_mut(other);
        self
    }

    #[inline]
    pub fn append_mut(&mut self, other: impl Into<SQL<'a>>) {
        let other = other.into();
        if self.chunks.is_empty() {
            self.chunks = other.chunks;
            return;
        }
        self.chunks.extend(other.chunks);
    }

    /// Push a single chunk
    #[inline]
    pub fn push(mut self, chunk: impl Into<SQLChunk<'a>>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    #[inline]
    pub fn push_mut(&mut self, chunk: impl Into<SQLChunk<'a>>) {
        self.chunks.push(chunk.into());
    }

    // ==================== combinators ====================

    /// Joins multiple SQL fragments with a separator
    pub fn join<T>(sqls: T, separator: Token) -> SQL<'a>
    where
        T: IntoIterator<Item = SQL<'a>>,
    {
        let mut result = SQL::empty();
        for (i, sql) in sqls.into_iter().enumerate() {
            if i > 0 {
                result.chunks.push(SQLChunk::Token(separator));
            }
            result.chunks.extend(sql.chunks);
        }
        result
    }

    /// Wrap in parentheses: (self)
    #[inline]
    pub fn parens(self) -> Self {
        SQL::token(Token::LPAREN).append(self).push(Token::RPAREN)
    }

    /// Creates an aliased version: self AS "name"
    pub fn alias(self, name: impl Into<Cow<'a, str>>) -> SQL<'a> {
        self.push(Token::AS).push(SQLChunk::Ident(name.into()))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    // ==================== output methods ====================

    /// Returns the SQL text.
    pub fn sql(&self) -> String {
        let mut buf = String::with_capacity(self.chunks.len().saturating_mul(8).max(64));
        self.write_to(&mut buf);
        buf
    }

    /// Generates the SQL string and collects parameter values in a single pass.
    ///
    /// Values come out in the textual order of their `?` placeholders.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut buf = String::with_capacity(self.chunks.len().saturating_mul(8).max(64));
        self.write_to(&mut buf);
        (buf, self.params().cloned().collect())
    }

    /// Write SQL to a buffer.
    pub fn write_to(&self, buf: &mut impl Write) {
        for (i, chunk) in self.chunks.iter().enumerate() {
            chunk.write(buf);
            if let Some(next) = self.chunks.get(i + 1)
                && chunk_needs_space(chunk, next)
            {
                let _ = buf.write_char(' ');
            }
        }
    }

    /// Returns an iterator over parameter values, in placeholder order
    pub fn params(&self) -> impl Iterator<Item = &Value> {
        self.chunks.iter().flat_map(|chunk| match chunk {
            SQLChunk::Param(value) => core::slice::from_ref(value),
            SQLChunk::Literal { arguments, .. } => arguments.as_slice(),
            _ => &[],
        })
    }
}

impl<'a> From<Token> for SQL<'a> {
    fn from(value: Token) -> Self {
        SQL::token(value)
    }
}

impl<'a> From<SQLChunk<'a>> for SQL<'a> {
    fn from(value: SQLChunk<'a>) -> Self {
        SQL {
            chunks: smallvec::smallvec![value],
        }
    }
}

impl<'a> Display for SQL<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let params: Vec<_> = self.params().collect();
        write!(f, r#"sql: "{}", params: {:?}"#, self.sql(), params)
    }
}

impl<'a> IntoIterator for SQL<'a> {
    type Item = SQLChunk<'a>;
    type IntoIter = smallvec::IntoIter<[SQLChunk<'a>; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_spacing() {
        let sql = SQL::token(Token::SELECT)
            .push(Token::STAR)
            .push(Token::FROM)
            .append(SQL::ident("player"))
            .push(Token::WHERE)
            .append(SQL::ident("score"))
            .push(Token::GT)
            .append(SQL::param(10))
            .push(Token::LIMIT)
            .append(SQL::number(5));
        let (text, params) = sql.build();
        assert_eq!(text, r#"SELECT * FROM "player" WHERE "score" > ? LIMIT 5"#);
        assert_eq!(params, vec![Value::Integer(10)]);
    }

    #[test]
    fn test_qualified_column_and_function() {
        let sql = SQL::func(
            "COUNT",
            SQL::token(Token::DISTINCT)
                .append(SQL::ident("book"))
                .push(Token::DOT)
                .append(SQL::ident("title")),
        );
        assert_eq!(sql.sql(), r#"COUNT(DISTINCT "book"."title")"#);
        assert_eq!(SQL::func("COUNT", SQL::token(Token::STAR)).sql(), "COUNT(*)");
    }

    #[test]
    fn test_list_and_parens() {
        let list = SQL::join([SQL::param(1), SQL::param(2)], Token::COMMA).parens();
        let sql = SQL::ident("id").push(Token::IN).append(list);
        assert_eq!(sql.sql(), r#""id" IN (?, ?)"#);
        assert_eq!(sql.params().count(), 2);
    }

    #[test]
    fn test_null_param_renders_inline() {
        let sql = SQL::ident("name").push(Token::IS).append(SQL::param(Value::Null));
        let (text, params) = sql.build();
        assert_eq!(text, r#""name" IS NULL"#);
        assert!(params.is_empty());
    }

    #[test]
    fn test_literal_arguments_keep_order() {
        let sql = SQL::param("a")
            .push(Token::AND)
            .append(SQL::literal("x BETWEEN ? AND ?", vec![Value::Integer(1), Value::Integer(2)]))
            .push(Token::AND)
            .append(SQL::param("b"));
        let (_, params) = sql.build();
        assert_eq!(
            params,
            vec![
                Value::from("a"),
                Value::Integer(1),
                Value::Integer(2),
                Value::from("b")
            ]
        );
    }

    #[test]
    fn test_ident_escaping() {
        assert_eq!(SQL::ident(r#"we"ird"#).sql(), r#""we""ird""#);
    }
}
