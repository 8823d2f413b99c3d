//! Schema introspection and execution with [`rusqlite`].

use ::rusqlite::{Connection, OptionalExtension, params_from_iter};

use crate::error::{QueryError, Result};
use crate::query::QueryTree;
use crate::schema::{ForeignKeyInfo, PrimaryKeyInfo, SchemaSource, same_columns};
use crate::value::Value;

struct ColumnInfo {
    name: String,
    declared_type: String,
    primary_key_index: i64,
}

fn table_info(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare("SELECT name, type, pk FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                declared_type: row.get(1)?,
                primary_key_index: row.get(2)?,
            })
        })?
        .collect::<::rusqlite::Result<Vec<_>>>()?;
    if columns.is_empty() {
        return Err(QueryError::UnknownTable {
            table: table.to_owned(),
        });
    }
    Ok(columns)
}

fn unique_indexes(conn: &Connection, table: &str) -> Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1")?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<::rusqlite::Result<Vec<_>>>()?;

    let mut stmt =
        conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
    let mut indexes = Vec::with_capacity(names.len());
    for name in names {
        let columns = stmt
            .query_map([&name], |row| row.get::<_, Option<String>>(0))?
            .collect::<::rusqlite::Result<Vec<_>>>()?;
        // Indexes on expressions have NULL column names.
        if let Some(columns) = columns.into_iter().collect::<Option<Vec<_>>>() {
            indexes.push(columns);
        }
    }
    Ok(indexes)
}

impl SchemaSource for Connection {
    fn canonical_table_name(&self, table: &str) -> Result<String> {
        self.query_row(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE",
            [table],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| QueryError::UnknownTable {
            table: table.to_owned(),
        })
    }

    fn primary_key(&self, table: &str) -> Result<PrimaryKeyInfo> {
        let mut columns: Vec<ColumnInfo> = table_info(self, table)?
            .into_iter()
            .filter(|column| column.primary_key_index > 0)
            .collect();
        columns.sort_by_key(|column| column.primary_key_index);
        Ok(match columns.as_slice() {
            [] => PrimaryKeyInfo::hidden_row_id(),
            [column] if column.declared_type.eq_ignore_ascii_case("INTEGER") => {
                PrimaryKeyInfo::row_id(column.name.clone())
            }
            columns => PrimaryKeyInfo::regular(columns.iter().map(|column| column.name.clone())),
        })
    }

    fn columns_for_unique_key(
        &self,
        columns: &[String],
        table: &str,
    ) -> Result<Option<Vec<String>>> {
        let requested = || columns.iter().map(String::as_str);
        let primary_key = self.primary_key(table)?;
        if same_columns(requested(), primary_key.columns.iter().map(String::as_str)) {
            return Ok(Some(primary_key.columns));
        }
        Ok(unique_indexes(self, table)?
            .into_iter()
            .find(|index| same_columns(requested(), index.iter().map(String::as_str))))
    }

    fn column_count(&self, table: &str) -> Result<usize> {
        Ok(table_info(self, table)?.len())
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let mut stmt = self.prepare(
            "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let rows = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<::rusqlite::Result<Vec<_>>>()?;

        let mut foreign_keys: Vec<(i64, String, Vec<(String, Option<String>)>)> = Vec::new();
        for (id, destination, origin, target) in rows {
            match foreign_keys.last_mut() {
                Some((last_id, _, mapping)) if *last_id == id => mapping.push((origin, target)),
                _ => foreign_keys.push((id, destination, vec![(origin, target)])),
            }
        }

        foreign_keys
            .into_iter()
            .map(|(_, destination, mapping)| -> Result<ForeignKeyInfo> {
                // A foreign key without target columns refers to the primary key.
                let targets = if mapping.iter().any(|(_, target)| target.is_none()) {
                    self.primary_key(&destination)?.columns
                } else {
                    mapping.iter().filter_map(|(_, target)| target.clone()).collect()
                };
                Ok(ForeignKeyInfo {
                    mapping: mapping
                        .into_iter()
                        .map(|(origin, _)| origin)
                        .zip(targets)
                        .collect(),
                    destination_table: destination,
                })
            })
            .collect()
    }

    fn supports_delete_limit(&self) -> bool {
        self.query_row(
            "SELECT sqlite_compileoption_used('ENABLE_UPDATE_DELETE_LIMIT')",
            [],
            |row| row.get::<_, bool>(0),
        )
        .unwrap_or(false)
    }
}

impl QueryTree {
    /// Runs the SELECT statement and returns all rows.
    ///
    /// Slice rows with the adapter of [`QueryTree::prepare`].
    pub fn fetch_all(&self, conn: &Connection) -> Result<Vec<Vec<Value>>> {
        let statement = self.select_statement(conn)?;
        let mut stmt = conn.prepare(&statement.sql)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(&statement.params), |row| {
                (0..width)
                    .map(|index| row.get::<_, Value>(index))
                    .collect::<::rusqlite::Result<Vec<Value>>>()
            })?
            .collect::<::rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Runs the count query.
    pub fn fetch_count(&self, conn: &Connection) -> Result<i64> {
        let statement = self.count_statement(conn)?;
        Ok(conn.query_row(&statement.sql, params_from_iter(&statement.params), |row| {
            row.get(0)
        })?)
    }

    /// Deletes the selected rows, returning how many were deleted.
    pub fn delete_all(&self, conn: &Connection) -> Result<usize> {
        let statement = self.delete_statement(conn)?;
        Ok(conn.execute(&statement.sql, params_from_iter(&statement.params))?)
    }
}
