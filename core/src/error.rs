use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// Two joins under the same parent share a key but cannot be merged
    #[error(
        "Association key \"{key}\" is ambiguous: the same key refers to incompatible joins. \
         Disambiguate the associations with distinct keys."
    )]
    AmbiguousAssociationKey { key: String },

    /// A required association was chained behind an optional one
    #[error(
        "Not implemented: chaining the required association \"{key}\" behind an optional association"
    )]
    RequiredJoinBehindOptional { key: String },

    /// The request cannot be translated into a DELETE statement
    #[error("Invalid delete request: {0}")]
    InvalidDelete(&'static str),

    /// The query of a joined association uses a clause a join can't express
    #[error("Association \"{key}\" can't be joined: {clause} is not supported in joined queries")]
    InvalidJoin { key: String, clause: &'static str },

    /// SELECT statements need at least one selected column
    #[error("Can't generate SQL with an empty selection")]
    EmptySelection,

    /// No foreign key could be inferred between two tables
    #[error("Could not infer foreign key from {origin} to {destination}")]
    ForeignKeyNotFound { origin: String, destination: String },

    /// Several foreign keys match an association
    #[error("Ambiguous foreign key from {origin} to {destination}: {candidates} candidates")]
    AmbiguousForeignKey {
        origin: String,
        destination: String,
        candidates: usize,
    },

    /// A key-based filter targets columns without a unique index
    #[error("Table {table} has no unique index on column(s) {}", columns.join(", "))]
    NoUniqueIndex { table: String, columns: Vec<String> },

    /// The SQLite build does not accept DELETE ... LIMIT
    #[error(
        "DELETE with ORDER BY/LIMIT requires SQLite compiled with SQLITE_ENABLE_UPDATE_DELETE_LIMIT"
    )]
    DeleteLimitUnsupported,

    /// A table alias was bound or proxied onto a different table
    #[error("Table alias bound to \"{bound}\" can't refer to \"{requested}\"")]
    AliasConflict { bound: String, requested: String },

    /// Two distinct table occurrences were given the same alias name
    #[error("Ambiguous alias: \"{name}\" names several tables")]
    AmbiguousAlias { name: String },

    /// A column refers to an alias that does not occur in the statement
    #[error("Undefined alias: {name}")]
    UnknownAlias { name: String },

    /// Schema lookup for a missing table
    #[error("No such table: {table}")]
    UnknownTable { table: String },

    /// Primary key filter does not match the primary key shape
    #[error("Primary key of table {table} has {expected} column(s), got {found} value(s)")]
    PrimaryKeyMismatch {
        table: String,
        expected: usize,
        found: usize,
    },

    /// Error reported by the schema collaborator
    #[error("Schema error: {0}")]
    Schema(String),

    /// Rusqlite specific errors
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for query compilation
pub type Result<T> = std::result::Result<T, QueryError>;
