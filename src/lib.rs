//! # Quarry
//!
//! Query trees with association joins, compiled to SQLite statements.
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry::prelude::*;
//!
//! # fn main() -> quarry::Result<()> {
//! let db = MemorySchema::new()
//!     .with_table(
//!         TableSchema::new("author")
//!             .columns(["id", "name"])
//!             .integer_primary_key("id"),
//!     )
//!     .with_table(
//!         TableSchema::new("book")
//!             .columns(["id", "authorId", "title"])
//!             .integer_primary_key("id")
//!             .foreign_key("author", [("authorId", "id")]),
//!     );
//!
//! let prepared = QueryTree::table("book")
//!     .including_required(Association::belongs_to("book", "author"))?
//!     .prepare(&db)?;
//!
//! assert_eq!(
//!     prepared.statement.sql,
//!     r#"SELECT "book".*, "author".* FROM "book" JOIN "author" ON "author"."id" = "book"."authorId""#
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! | Feature    | Default | Description                                        |
//! |------------|---------|----------------------------------------------------|
//! | `rusqlite` | yes     | Schema introspection and execution with rusqlite   |
//! | `tracing`  | yes     | Debug events for compiled statements and fallbacks |

pub use quarry_core::*;

/// Everything needed to build and compile requests.
pub mod prelude {
    pub use quarry_core::prelude::*;
    pub use quarry_core::{DatabaseRegion, JoinOperator, PreparedQuery, SqlStatement};
}
