//! Filters and grouping on primary and unique keys.

use super::QueryTree;
use crate::deferred::Deferred;
use crate::error::{QueryError, Result};
use crate::expr::{SqlExpr, col};
use crate::schema::SchemaSource;
use crate::value::Value;

impl QueryTree {
    fn key_table(&self) -> Option<String> {
        self.source.table_name().map(str::to_owned)
    }

    /// Keeps rows whose single-column primary key is one of `values`.
    ///
    /// NULL values match nothing.
    pub fn filter_by_primary_key<I>(self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values
            .into_iter()
            .map(Into::into)
            .filter(|value| !value.is_null())
            .collect();
        let table = self.key_table();
        self.filter_deferred(Deferred::new(move |db| {
            let table = table.clone().ok_or_else(not_a_table)?;
            let primary_key = db.primary_key(&table)?;
            let [column] = primary_key.columns.as_slice() else {
                return Err(QueryError::PrimaryKeyMismatch {
                    table,
                    expected: primary_key.columns.len(),
                    found: 1,
                });
            };
            Ok(match values.as_slice() {
                [] => SqlExpr::none(),
                [value] => col(column.as_str()).eq(value.clone()),
                values => col(column.as_str()).is_in(values.iter().cloned()),
            })
        }))
    }

    /// Keeps the row whose unique key equals `key`.
    ///
    /// The columns must form the primary key or a unique index. A NULL value
    /// matches nothing.
    pub fn filter_by_key<I, S, V>(self, key: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        let key: Vec<(String, Value)> = key
            .into_iter()
            .map(|(column, value)| (column.into(), value.into()))
            .collect();
        let table = self.key_table();
        self.filter_deferred(Deferred::new(move |db| {
            let table = table.clone().ok_or_else(not_a_table)?;
            key_predicate(db, &table, &key)
        }))
    }

    /// Groups by the primary key, `rowid` for tables without one.
    pub fn group_by_primary_key(mut self) -> Self {
        let table = self.key_table();
        self.group = Some(Deferred::new(move |db| {
            let table = table.clone().ok_or_else(not_a_table)?;
            Ok(db
                .primary_key(&table)?
                .columns
                .into_iter()
                .map(|column| col(column))
                .collect())
        }));
        self
    }
}

fn not_a_table() -> QueryError {
    QueryError::Schema("key lookups need a table source".to_owned())
}

fn key_predicate(db: &dyn SchemaSource, table: &str, key: &[(String, Value)]) -> Result<SqlExpr> {
    let columns: Vec<String> = key.iter().map(|(column, _)| column.clone()).collect();
    if db.columns_for_unique_key(&columns, table)?.is_none() {
        return Err(QueryError::NoUniqueIndex {
            table: table.to_owned(),
            columns,
        });
    }
    if key.iter().any(|(_, value)| value.is_null()) {
        return Ok(SqlExpr::none());
    }
    Ok(key
        .iter()
        .map(|(column, value)| col(column.as_str()).eq(value.clone()))
        .reduce(|predicate, term| predicate.and(term))
        .unwrap_or_else(SqlExpr::none))
}
