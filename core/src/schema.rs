//! Schema introspection.
//!
//! Compilation asks a [`SchemaSource`] about primary keys, unique keys, column
//! counts and foreign keys. [`MemorySchema`] answers from a static description;
//! with the `rusqlite` feature a `rusqlite::Connection` answers from the live
//! database.

use hashbrown::HashMap;

use crate::error::{QueryError, Result};

/// Primary key of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyInfo {
    pub columns: Vec<String>,
    /// True when the key is the SQLite row id (hidden, or an `INTEGER PRIMARY KEY`)
    pub is_row_id: bool,
}

impl PrimaryKeyInfo {
    /// The implicit `rowid` of tables without an explicit primary key.
    pub fn hidden_row_id() -> Self {
        Self {
            columns: vec!["rowid".to_owned()],
            is_row_id: true,
        }
    }

    /// An `INTEGER PRIMARY KEY` column, alias of the row id.
    pub fn row_id(column: impl Into<String>) -> Self {
        Self {
            columns: vec![column.into()],
            is_row_id: true,
        }
    }

    pub fn regular<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            is_row_id: false,
        }
    }

    /// The column holding the row id, if the key is the row id.
    pub fn row_id_column(&self) -> Option<&str> {
        match self.columns.as_slice() {
            [column] if self.is_row_id => Some(column),
            _ => None,
        }
    }
}

/// A foreign key declared on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub destination_table: String,
    /// (origin column, destination column) pairs
    pub mapping: Vec<(String, String)>,
}

impl ForeignKeyInfo {
    pub fn origin_columns(&self) -> impl Iterator<Item = &str> {
        self.mapping.iter().map(|(origin, _)| origin.as_str())
    }

    pub fn destination_columns(&self) -> impl Iterator<Item = &str> {
        self.mapping.iter().map(|(_, destination)| destination.as_str())
    }
}

/// Schema collaborator consulted during compilation.
pub trait SchemaSource {
    /// The table name as declared in the schema.
    fn canonical_table_name(&self, table: &str) -> Result<String>;

    fn primary_key(&self, table: &str) -> Result<PrimaryKeyInfo>;

    /// The columns of a primary key or unique index made of exactly `columns`,
    /// in index order, if there is one.
    fn columns_for_unique_key(&self, columns: &[String], table: &str)
    -> Result<Option<Vec<String>>>;

    fn column_count(&self, table: &str) -> Result<usize>;

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>>;

    /// Whether `DELETE` accepts `ORDER BY` and `LIMIT`.
    fn supports_delete_limit(&self) -> bool {
        false
    }
}

/// Case-insensitive column set comparison.
pub(crate) fn same_columns<'a, 'b>(
    lhs: impl IntoIterator<Item = &'a str>,
    rhs: impl IntoIterator<Item = &'b str>,
) -> bool {
    let mut lhs: Vec<String> = lhs.into_iter().map(str::to_ascii_lowercase).collect();
    let mut rhs: Vec<String> = rhs.into_iter().map(str::to_ascii_lowercase).collect();
    lhs.sort_unstable();
    rhs.sort_unstable();
    lhs == rhs
}

/// Static description of one table.
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    name: String,
    columns: Vec<String>,
    primary_key: Option<PrimaryKeyInfo>,
    unique_keys: Vec<Vec<String>>,
    foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Declares an `INTEGER PRIMARY KEY` column.
    pub fn integer_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(PrimaryKeyInfo::row_id(column));
        self
    }

    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(PrimaryKeyInfo::regular(columns));
        self
    }

    pub fn unique<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_keys
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Declares a foreign key as (origin column, destination column) pairs.
    pub fn foreign_key<I, O, D>(mut self, destination_table: impl Into<String>, mapping: I) -> Self
    where
        I: IntoIterator<Item = (O, D)>,
        O: Into<String>,
        D: Into<String>,
    {
        self.foreign_keys.push(ForeignKeyInfo {
            destination_table: destination_table.into(),
            mapping: mapping
                .into_iter()
                .map(|(origin, destination)| (origin.into(), destination.into()))
                .collect(),
        });
        self
    }

    fn primary_key_info(&self) -> PrimaryKeyInfo {
        self.primary_key
            .clone()
            .unwrap_or_else(PrimaryKeyInfo::hidden_row_id)
    }
}

/// An in-memory [`SchemaSource`].
#[derive(Debug, Clone, Default)]
pub struct MemorySchema {
    tables: HashMap<String, TableSchema>,
    delete_limit: bool,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.insert(table.name.to_ascii_lowercase(), table);
        self
    }

    /// Declares whether `DELETE ... LIMIT` is available.
    pub fn with_delete_limit(mut self, supported: bool) -> Self {
        self.delete_limit = supported;
        self
    }

    fn table(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| QueryError::UnknownTable {
                table: name.to_owned(),
            })
    }
}

impl SchemaSource for MemorySchema {
    fn canonical_table_name(&self, table: &str) -> Result<String> {
        Ok(self.table(table)?.name.clone())
    }

    fn primary_key(&self, table: &str) -> Result<PrimaryKeyInfo> {
        Ok(self.table(table)?.primary_key_info())
    }

    fn columns_for_unique_key(
        &self,
        columns: &[String],
        table: &str,
    ) -> Result<Option<Vec<String>>> {
        let schema = self.table(table)?;
        let requested = || columns.iter().map(String::as_str);
        let primary_key = schema.primary_key_info();
        if same_columns(requested(), primary_key.columns.iter().map(String::as_str)) {
            return Ok(Some(primary_key.columns));
        }
        Ok(schema
            .unique_keys
            .iter()
            .find(|key| same_columns(requested(), key.iter().map(String::as_str)))
            .cloned())
    }

    fn column_count(&self, table: &str) -> Result<usize> {
        Ok(self.table(table)?.columns.len())
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        Ok(self.table(table)?.foreign_keys.clone())
    }

    fn supports_delete_limit(&self) -> bool {
        self.delete_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> MemorySchema {
        MemorySchema::new()
            .with_table(
                TableSchema::new("player")
                    .columns(["id", "name", "email"])
                    .integer_primary_key("id")
                    .unique(["email"]),
            )
            .with_table(TableSchema::new("log").columns(["message"]))
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let db = schema();
        assert_eq!(db.canonical_table_name("PLAYER").unwrap(), "player");
        assert_eq!(db.column_count("Player").unwrap(), 3);
        assert!(matches!(
            db.column_count("team"),
            Err(QueryError::UnknownTable { .. })
        ));
    }

    #[test]
    fn test_primary_keys() {
        let db = schema();
        let key = db.primary_key("player").unwrap();
        assert_eq!(key.row_id_column(), Some("id"));
        let hidden = db.primary_key("log").unwrap();
        assert_eq!(hidden, PrimaryKeyInfo::hidden_row_id());
        assert_eq!(PrimaryKeyInfo::regular(["a", "b"]).row_id_column(), None);
    }

    #[test]
    fn test_unique_keys() {
        let db = schema();
        assert_eq!(
            db.columns_for_unique_key(&["EMAIL".to_owned()], "player")
                .unwrap(),
            Some(vec!["email".to_owned()])
        );
        assert_eq!(
            db.columns_for_unique_key(&["name".to_owned()], "player")
                .unwrap(),
            None
        );
    }
}
