use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::schema::SchemaSource;

/// A value computed from the schema at compile time.
///
/// Filters such as primary key lookups are only known once a schema is
/// available. Composing deferred values composes the functions; nothing runs
/// until [`Deferred::resolve`].
pub struct Deferred<T>(Arc<dyn Fn(&dyn SchemaSource) -> Result<T> + Send + Sync>);

impl<T: 'static> Deferred<T> {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(&dyn SchemaSource) -> Result<T> + Send + Sync + 'static,
    {
        Deferred(Arc::new(resolve))
    }

    /// A value that does not depend on the schema.
    pub fn value(value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        Deferred::new(move |_| Ok(value.clone()))
    }

    pub fn resolve(&self, db: &dyn SchemaSource) -> Result<T> {
        (self.0)(db)
    }

    pub fn map<U: 'static, F>(&self, transform: F) -> Deferred<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let inner = self.0.clone();
        Deferred::new(move |db| inner(db).map(&transform))
    }

    /// Resolves both values and combines them.
    pub fn zip_with<U: 'static, V: 'static, F>(&self, other: &Deferred<U>, combine: F) -> Deferred<V>
    where
        F: Fn(T, U) -> V + Send + Sync + 'static,
    {
        let lhs = self.0.clone();
        let rhs = other.0.clone();
        Deferred::new(move |db| Ok(combine(lhs(db)?, rhs(db)?)))
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred(self.0.clone())
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MemorySchema, TableSchema};

    #[test]
    fn test_resolve_against_schema() {
        let db = MemorySchema::new().with_table(TableSchema::new("player").columns(["id", "name"]));
        let count = Deferred::new(|db| db.column_count("player"));
        let doubled = count.map(|n| n * 2);
        assert_eq!(doubled.resolve(&db).unwrap(), 4);
        let sum = count.zip_with(&Deferred::value(1), |a, b| a + b);
        assert_eq!(sum.resolve(&db).unwrap(), 3);
    }

    #[test]
    fn test_errors_propagate() {
        let db = MemorySchema::new();
        let count = Deferred::new(|db| db.column_count("missing")).map(|n| n + 1);
        assert!(count.resolve(&db).is_err());
    }
}
