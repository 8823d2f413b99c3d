//! Query trees, association joins and SQL generation for SQLite.
//!
//! A [`QueryTree`] describes a request: its source table, selection, filter,
//! grouping, ordering, limit, and joins to associated tables. Compiling it
//! yields one SQL statement, and a [`RowAdapter`] that slices fetched rows into
//! a main row and one sub-row per association.

pub mod adapter;
pub mod alias;
pub mod association;
pub mod deferred;
pub mod error;
pub mod expr;
pub mod generation;
pub mod ordering;
pub mod prepared;
pub mod query;
pub mod region;
#[cfg(feature = "rusqlite")]
pub mod rusqlite;
pub mod schema;
pub mod selection;
pub mod source;
pub mod sql;
pub mod tracing;
pub mod value;

pub use adapter::{AdaptedRow, RowAdapter};
pub use alias::TableAlias;
pub use association::{Association, AssociationJoin, ForeignKeyRequest, JoinCondition, JoinOperator};
pub use deferred::Deferred;
pub use error::{QueryError, Result};
pub use expr::{BinaryOp, SqlExpr, col, literal};
pub use ordering::{Direction, OrderingTerm, QueryOrdering};
pub use prepared::{PreparedQuery, SqlStatement};
pub use query::{Limit, QueryTree};
pub use region::DatabaseRegion;
pub use schema::{ForeignKeyInfo, MemorySchema, PrimaryKeyInfo, SchemaSource, TableSchema};
pub use selection::Selection;
pub use source::Source;
pub use sql::{SQL, SQLChunk, Token};
pub use value::Value;

/// Everything needed to build and compile requests.
pub mod prelude {
    pub use crate::adapter::RowAdapter;
    pub use crate::alias::TableAlias;
    pub use crate::association::Association;
    pub use crate::error::{QueryError, Result};
    pub use crate::expr::{SqlExpr, col, literal};
    pub use crate::ordering::Direction;
    pub use crate::query::QueryTree;
    pub use crate::schema::{MemorySchema, SchemaSource, TableSchema};
    pub use crate::selection::Selection;
    pub use crate::value::Value;
}
