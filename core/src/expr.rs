//! Scalar SQL expressions.
//!
//! Expressions are plain values. Column references may carry the alias of the
//! table occurrence they belong to; bare columns get one during qualification.

use crate::alias::TableAlias;
use crate::error::Result;
use crate::generation::RenderScope;
use crate::sql::{SQL, Token};
use crate::value::Value;

/// Binary operators, rendered infix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
    Like,
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
}

impl BinaryOp {
    const fn token(self) -> Token {
        match self {
            BinaryOp::Eq => Token::EQ,
            BinaryOp::NotEq => Token::NE,
            BinaryOp::Lt => Token::LT,
            BinaryOp::Le => Token::LE,
            BinaryOp::Gt => Token::GT,
            BinaryOp::Ge => Token::GE,
            BinaryOp::Is => Token::IS,
            BinaryOp::IsNot => Token::IS_NOT,
            BinaryOp::Like => Token::LIKE,
            BinaryOp::Add => Token::PLUS,
            BinaryOp::Subtract => Token::MINUS,
            BinaryOp::Multiply => Token::STAR,
            BinaryOp::Divide => Token::SLASH,
            BinaryOp::Concat => Token::CONCAT,
        }
    }

    const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Is | BinaryOp::IsNot | BinaryOp::Like => {
                PREC_EQUALITY
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::Add | BinaryOp::Subtract => 6,
            BinaryOp::Multiply | BinaryOp::Divide => 7,
            BinaryOp::Concat => 8,
        }
    }
}

const PREC_LITERAL: u8 = 0;
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_NOT: u8 = 3;
const PREC_EQUALITY: u8 = 4;
const PREC_PRIMARY: u8 = 10;

/// A SQL scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// `"name"` or `"alias"."name"`
    Column {
        name: String,
        qualifier: Option<TableAlias>,
    },
    /// A bound value (`?`), or `NULL`
    Value(Value),
    /// Raw SQL with its own `?` arguments
    Literal { sql: String, arguments: Vec<Value> },
    Binary {
        op: BinaryOp,
        lhs: Box<SqlExpr>,
        rhs: Box<SqlExpr>,
    },
    And(Vec<SqlExpr>),
    Or(Vec<SqlExpr>),
    Not(Box<SqlExpr>),
    In {
        expr: Box<SqlExpr>,
        list: Vec<SqlExpr>,
        negated: bool,
    },
    Function { name: String, args: Vec<SqlExpr> },
    /// `COUNT(*)`
    CountAll,
    /// `COUNT(DISTINCT expr)`
    CountDistinct(Box<SqlExpr>),
}

/// Creates a bare column reference.
pub fn col(name: impl Into<String>) -> SqlExpr {
    SqlExpr::column(name)
}

/// Creates a raw SQL expression with `?` arguments.
pub fn literal(sql: impl Into<String>, arguments: impl IntoIterator<Item = Value>) -> SqlExpr {
    SqlExpr::Literal {
        sql: sql.into(),
        arguments: arguments.into_iter().collect(),
    }
}

impl SqlExpr {
    pub fn column(name: impl Into<String>) -> Self {
        SqlExpr::Column {
            name: name.into(),
            qualifier: None,
        }
    }

    pub fn value(value: impl Into<Value>) -> Self {
        SqlExpr::Value(value.into())
    }

    /// An always-false condition.
    pub fn none() -> Self {
        literal("0", [])
    }

    fn binary(self, op: BinaryOp, rhs: impl Into<SqlExpr>) -> Self {
        SqlExpr::Binary {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs.into()),
        }
    }

    pub fn eq(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn ne(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::NotEq, rhs)
    }

    pub fn lt(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Ge, rhs)
    }

    pub fn is(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Is, rhs)
    }

    pub fn is_not(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::IsNot, rhs)
    }

    pub fn is_null(self) -> Self {
        self.is(Value::Null)
    }

    pub fn is_not_null(self) -> Self {
        self.is_not(Value::Null)
    }

    pub fn like(self, pattern: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Like, pattern)
    }

    pub fn add(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn subtract(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Subtract, rhs)
    }

    pub fn multiply(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Multiply, rhs)
    }

    pub fn divide(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Divide, rhs)
    }

    pub fn concat(self, rhs: impl Into<SqlExpr>) -> Self {
        self.binary(BinaryOp::Concat, rhs)
    }

    /// `self AND rhs`, flattening nested conjunctions.
    pub fn and(self, rhs: impl Into<SqlExpr>) -> Self {
        let mut terms = match self {
            SqlExpr::And(terms) => terms,
            other => vec![other],
        };
        match rhs.into() {
            SqlExpr::And(more) => terms.extend(more),
            other => terms.push(other),
        }
        SqlExpr::And(terms)
    }

    /// `self OR rhs`, flattening nested disjunctions.
    pub fn or(self, rhs: impl Into<SqlExpr>) -> Self {
        let mut terms = match self {
            SqlExpr::Or(terms) => terms,
            other => vec![other],
        };
        match rhs.into() {
            SqlExpr::Or(more) => terms.extend(more),
            other => terms.push(other),
        }
        SqlExpr::Or(terms)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        SqlExpr::Not(Box::new(self))
    }

    pub fn is_in<I>(self, list: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SqlExpr>,
    {
        SqlExpr::In {
            expr: Box::new(self),
            list: list.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<I>(self, list: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SqlExpr>,
    {
        SqlExpr::In {
            expr: Box::new(self),
            list: list.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn function(name: impl Into<String>, args: impl IntoIterator<Item = SqlExpr>) -> Self {
        SqlExpr::Function {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn count_all() -> Self {
        SqlExpr::CountAll
    }

    pub fn count_distinct(self) -> Self {
        SqlExpr::CountDistinct(Box::new(self))
    }

    /// Gives every bare column reference the `alias` qualifier.
    ///
    /// Columns that already carry an alias keep it.
    pub fn qualified(&self, alias: &TableAlias) -> SqlExpr {
        let qualify_all = |exprs: &[SqlExpr]| exprs.iter().map(|e| e.qualified(alias)).collect();
        match self {
            SqlExpr::Column {
                name,
                qualifier: None,
            } => SqlExpr::Column {
                name: name.clone(),
                qualifier: Some(alias.clone()),
            },
            SqlExpr::Column { .. }
            | SqlExpr::Value(_)
            | SqlExpr::Literal { .. }
            | SqlExpr::CountAll => self.clone(),
            SqlExpr::Binary { op, lhs, rhs } => SqlExpr::Binary {
                op: *op,
                lhs: Box::new(lhs.qualified(alias)),
                rhs: Box::new(rhs.qualified(alias)),
            },
            SqlExpr::And(terms) => SqlExpr::And(qualify_all(terms)),
            SqlExpr::Or(terms) => SqlExpr::Or(qualify_all(terms)),
            SqlExpr::Not(expr) => SqlExpr::Not(Box::new(expr.qualified(alias))),
            SqlExpr::In {
                expr,
                list,
                negated,
            } => SqlExpr::In {
                expr: Box::new(expr.qualified(alias)),
                list: qualify_all(list),
                negated: *negated,
            },
            SqlExpr::Function { name, args } => SqlExpr::Function {
                name: name.clone(),
                args: qualify_all(args),
            },
            SqlExpr::CountDistinct(expr) => SqlExpr::CountDistinct(Box::new(expr.qualified(alias))),
        }
    }

    const fn precedence(&self) -> u8 {
        match self {
            SqlExpr::Literal { .. } => PREC_LITERAL,
            SqlExpr::Or(_) => PREC_OR,
            SqlExpr::And(_) => PREC_AND,
            SqlExpr::Not(_) => PREC_NOT,
            SqlExpr::In { .. } => PREC_EQUALITY,
            SqlExpr::Binary { op, .. } => op.precedence(),
            SqlExpr::Column { .. }
            | SqlExpr::Value(_)
            | SqlExpr::Function { .. }
            | SqlExpr::CountAll
            | SqlExpr::CountDistinct(_) => PREC_PRIMARY,
        }
    }

    /// Renders the expression, parenthesizing when it binds looser than `min`.
    fn operand(&self, min: u8, scope: &RenderScope<'_>) -> Result<SQL<'static>> {
        let sql = self.to_sql(scope)?;
        Ok(if self.precedence() < min {
            sql.parens()
        } else {
            sql
        })
    }

    fn list(exprs: &[SqlExpr], scope: &RenderScope<'_>) -> Result<SQL<'static>> {
        let items = exprs
            .iter()
            .map(|e| e.to_sql(scope))
            .collect::<Result<Vec<_>>>()?;
        Ok(SQL::join(items, Token::COMMA))
    }

    fn junction(
        terms: &[SqlExpr],
        separator: Token,
        min: u8,
        empty: &'static str,
        scope: &RenderScope<'_>,
    ) -> Result<SQL<'static>> {
        if terms.is_empty() {
            return Ok(SQL::raw(empty));
        }
        let items = terms
            .iter()
            .map(|e| e.operand(min, scope))
            .collect::<Result<Vec<_>>>()?;
        Ok(SQL::join(items, separator))
    }

    pub(crate) fn to_sql(&self, scope: &RenderScope<'_>) -> Result<SQL<'static>> {
        match self {
            SqlExpr::Column { name, qualifier } => scope.column(qualifier.as_ref(), name),
            SqlExpr::Value(Value::Null) => Ok(SQL::token(Token::NULL)),
            SqlExpr::Value(value) => Ok(SQL::param(value.clone())),
            SqlExpr::Literal { sql, arguments } => Ok(SQL::literal(sql.clone(), arguments.clone())),
            SqlExpr::Binary { op, lhs, rhs } => {
                let precedence = op.precedence();
                Ok(lhs
                    .operand(precedence, scope)?
                    .push(op.token())
                    .append(rhs.operand(precedence + 1, scope)?))
            }
            SqlExpr::And(terms) => Self::junction(terms, Token::AND, PREC_AND, "1", scope),
            SqlExpr::Or(terms) => Self::junction(terms, Token::OR, PREC_OR, "0", scope),
            SqlExpr::Not(expr) => Ok(SQL::token(Token::NOT).append(expr.operand(PREC_EQUALITY, scope)?)),
            SqlExpr::In {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    return Ok(SQL::raw(if *negated { "1" } else { "0" }));
                }
                let mut sql = expr.operand(PREC_EQUALITY + 1, scope)?;
                if *negated {
                    sql.push_mut(Token::NOT);
                }
                Ok(sql.push(Token::IN).append(Self::list(list, scope)?.parens()))
            }
            SqlExpr::Function { name, args } => Ok(SQL::func(name.clone(), Self::list(args, scope)?)),
            SqlExpr::CountAll => Ok(SQL::func("COUNT", SQL::token(Token::STAR))),
            SqlExpr::CountDistinct(expr) => Ok(SQL::func(
                "COUNT",
                SQL::token(Token::DISTINCT).append(expr.to_sql(scope)?),
            )),
        }
    }
}

macro_rules! impl_expr_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SqlExpr {
                fn from(value: $ty) -> Self {
                    SqlExpr::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_expr_from_value!(i8, i16, i32, i64, u8, u16, u32, bool, f32, f64, &str, String, Vec<u8>);

impl From<Value> for SqlExpr {
    fn from(value: Value) -> Self {
        SqlExpr::Value(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for SqlExpr {
    fn from(value: Option<T>) -> Self {
        SqlExpr::Value(Value::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::RenderScope;

    fn render(expr: &SqlExpr) -> (String, Vec<Value>) {
        expr.to_sql(&RenderScope::detached()).unwrap().build()
    }

    #[test]
    fn test_comparison() {
        let (sql, params) = render(&col("score").gt(10));
        assert_eq!(sql, r#""score" > ?"#);
        assert_eq!(params, vec![Value::Integer(10)]);
    }

    #[test]
    fn test_and_or_precedence() {
        let expr = col("a").eq(1).or(col("b").eq(2)).and(col("c").eq(3));
        assert_eq!(render(&expr).0, r#"("a" = ? OR "b" = ?) AND "c" = ?"#);

        let expr = col("a").eq(1).and(col("b").eq(2)).or(col("c").eq(3));
        assert_eq!(render(&expr).0, r#""a" = ? AND "b" = ? OR "c" = ?"#);
    }

    #[test]
    fn test_arithmetic_associativity() {
        let expr = col("a").subtract(col("b").subtract(col("c")));
        assert_eq!(render(&expr).0, r#""a" - ("b" - "c")"#);
        let expr = col("a").subtract(col("b")).subtract(col("c"));
        assert_eq!(render(&expr).0, r#""a" - "b" - "c""#);
    }

    #[test]
    fn test_in_and_not() {
        let expr = col("id").is_in([1, 2, 3]).not();
        let (sql, params) = render(&expr);
        assert_eq!(sql, r#"NOT "id" IN (?, ?, ?)"#);
        assert_eq!(params.len(), 3);
        assert_eq!(render(&col("id").is_in(Vec::<i64>::new())).0, "0");
        assert_eq!(render(&col("id").not_in(Vec::<i64>::new())).0, "1");
        assert_eq!(
            render(&col("a").eq(1).or(col("b").eq(2)).not()).0,
            r#"NOT ("a" = ? OR "b" = ?)"#
        );
    }

    #[test]
    fn test_null_and_functions() {
        assert_eq!(render(&col("email").is_null()).0, r#""email" IS NULL"#);
        assert_eq!(
            render(&SqlExpr::function("lower", [col("name")])).0,
            r#"lower("name")"#
        );
        assert_eq!(render(&col("name").count_distinct()).0, r#"COUNT(DISTINCT "name")"#);
    }

    #[test]
    fn test_literal_is_parenthesized_as_operand() {
        let expr = literal("score > ?", [Value::Integer(1)]).and(col("a").eq(2));
        assert_eq!(render(&expr).0, r#"(score > ?) AND "a" = ?"#);
    }

    #[test]
    fn test_qualified_keeps_existing_qualifier() {
        let a = TableAlias::new();
        let b = TableAlias::new();
        let expr = col("x").eq(b.column("y")).qualified(&a);
        let SqlExpr::Binary { lhs, rhs, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(
            *lhs,
            SqlExpr::Column {
                name: "x".into(),
                qualifier: Some(a)
            }
        );
        assert_eq!(*rhs, b.column("y"));
    }
}
