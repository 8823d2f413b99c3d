use crate::alias::TableAlias;
use crate::error::Result;
use crate::expr::SqlExpr;
use crate::generation::RenderScope;
use crate::schema::SchemaSource;
use crate::source::Source;
use crate::sql::{SQL, Token};

/// One item of a SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// `*`, or `"alias".*`
    AllColumns { qualifier: Option<TableAlias> },
    /// An expression, optionally named with `AS`
    Expr { expr: SqlExpr, alias: Option<String> },
}

impl Selection {
    pub fn all() -> Self {
        Selection::AllColumns { qualifier: None }
    }

    pub fn expr(expr: impl Into<SqlExpr>) -> Self {
        Selection::Expr {
            expr: expr.into(),
            alias: None,
        }
    }

    pub fn named(expr: impl Into<SqlExpr>, name: impl Into<String>) -> Self {
        Selection::Expr {
            expr: expr.into(),
            alias: Some(name.into()),
        }
    }

    pub fn qualified(&self, alias: &TableAlias) -> Self {
        match self {
            Selection::AllColumns { qualifier: None } => Selection::AllColumns {
                qualifier: Some(alias.clone()),
            },
            Selection::AllColumns { .. } => self.clone(),
            Selection::Expr { expr, alias: name } => Selection::Expr {
                expr: expr.qualified(alias),
                alias: name.clone(),
            },
        }
    }

    /// Number of columns this item produces when selected from `source`.
    pub fn column_count(&self, db: &dyn SchemaSource, source: &Source) -> Result<usize> {
        match self {
            Selection::AllColumns {
                qualifier: Some(qualifier),
            } if !source.is_aliased_by(qualifier) => match qualifier.table_name() {
                Some(table) => db.column_count(&table),
                None => source.column_count(db),
            },
            Selection::AllColumns { .. } => source.column_count(db),
            Selection::Expr { .. } => Ok(1),
        }
    }

    /// The counting expression equivalent to counting the rows of a
    /// `SELECT [DISTINCT] <self>` query, if there is one.
    pub(crate) fn count_expr(&self, distinct: bool) -> Option<SqlExpr> {
        match (self, distinct) {
            (Selection::AllColumns { .. }, false) => Some(SqlExpr::CountAll),
            (Selection::AllColumns { .. }, true) => None,
            (Selection::Expr { .. }, false) => Some(SqlExpr::CountAll),
            (Selection::Expr { expr, .. }, true) => Some(expr.clone().count_distinct()),
        }
    }

    pub(crate) fn to_sql(&self, scope: &RenderScope<'_>) -> Result<SQL<'static>> {
        match self {
            Selection::AllColumns { qualifier } => Ok(match scope.prefix(qualifier.as_ref())? {
                Some(prefix) => prefix.push(Token::STAR),
                None => SQL::token(Token::STAR),
            }),
            Selection::Expr { expr, alias } => {
                let sql = expr.to_sql(scope)?;
                Ok(match alias {
                    Some(name) => sql.alias(name.clone()),
                    None => sql,
                })
            }
        }
    }
}

impl From<SqlExpr> for Selection {
    fn from(expr: SqlExpr) -> Self {
        Selection::expr(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    #[test]
    fn test_render() {
        let scope = RenderScope::detached();
        assert_eq!(Selection::all().to_sql(&scope).unwrap().sql(), "*");
        assert_eq!(
            Selection::named(col("score").add(1), "next")
                .to_sql(&scope)
                .unwrap()
                .sql(),
            r#""score" + ? AS "next""#
        );
    }

    #[test]
    fn test_count_expr() {
        assert_eq!(Selection::all().count_expr(false), Some(SqlExpr::CountAll));
        assert_eq!(Selection::all().count_expr(true), None);
        assert_eq!(Selection::expr(col("name")).count_expr(false), Some(SqlExpr::CountAll));
        assert_eq!(
            Selection::expr(col("name")).count_expr(true),
            Some(col("name").count_distinct())
        );
    }
}
