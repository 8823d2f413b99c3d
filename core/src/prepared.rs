//! Compiled statements.

use std::fmt;

use crate::adapter::RowAdapter;
use crate::error::Result;
use crate::generation::GenerationContext;
use crate::query::QueryTree;
use crate::schema::SchemaSource;
use crate::value::Value;

/// SQL text with its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// A SELECT statement and the adapter of the rows it fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub statement: SqlStatement,
    pub adapter: Option<RowAdapter>,
}

impl QueryTree {
    /// `SELECT ...`
    pub fn select_statement(&self, db: &dyn SchemaSource) -> Result<SqlStatement> {
        let query = self.qualified()?;
        let (sql, params) = GenerationContext::new(db, &query)?
            .select_sql(&query)?
            .build();
        crate::quarry_trace_query!("select", sql, params.len());
        Ok(SqlStatement { sql, params })
    }

    /// `DELETE FROM ...`
    pub fn delete_statement(&self, db: &dyn SchemaSource) -> Result<SqlStatement> {
        let query = self.qualified()?;
        let (sql, params) = GenerationContext::new(db, &query)?
            .delete_sql(&query)?
            .build();
        crate::quarry_trace_query!("delete", sql, params.len());
        Ok(SqlStatement { sql, params })
    }

    /// `SELECT COUNT(...) ...`, see [`QueryTree::count_query`].
    pub fn count_statement(&self, db: &dyn SchemaSource) -> Result<SqlStatement> {
        self.count_query().select_statement(db)
    }

    /// Compiles the SELECT statement and its row adapter.
    pub fn prepare(&self, db: &dyn SchemaSource) -> Result<PreparedQuery> {
        let query = self.qualified()?;
        Ok(PreparedQuery {
            statement: query.select_statement(db)?,
            adapter: query.row_adapter(db)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;
    use crate::schema::{MemorySchema, TableSchema};

    #[test]
    fn test_select_statement() {
        let db = MemorySchema::new().with_table(
            TableSchema::new("player")
                .columns(["id", "name", "score"])
                .integer_primary_key("id"),
        );
        let statement = QueryTree::table("player")
            .filter(col("score").gt(10))
            .order([col("name")])
            .limit(5, None)
            .select_statement(&db)
            .unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT * FROM "player" WHERE "score" > ? ORDER BY "name" LIMIT 5"#
        );
        assert_eq!(statement.params, vec![Value::Integer(10)]);
        assert_eq!(statement.to_string(), statement.sql);
    }
}
