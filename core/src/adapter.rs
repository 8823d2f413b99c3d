//! Row adapters: slicing flat result rows into a main row and one sub-row per
//! association key.

use std::ops::Range;

use crate::error::{QueryError, Result};
use crate::query::QueryTree;
use crate::schema::SchemaSource;

/// Column ranges of a row and of its associated scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAdapter {
    pub range: Range<usize>,
    pub scopes: Vec<(String, RowAdapter)>,
}

impl RowAdapter {
    pub fn scope(&self, key: &str) -> Option<&RowAdapter> {
        self.scopes
            .iter()
            .find_map(|(k, adapter)| (k == key).then_some(adapter))
    }

    /// Slices `row`. Returns `None` when the row is too short.
    pub fn adapt<'a, 'r, T>(&'a self, row: &'r [T]) -> Option<AdaptedRow<'a, 'r, T>> {
        let scopes = self
            .scopes
            .iter()
            .map(|(key, adapter)| Some((key.as_str(), adapter.adapt(row)?)))
            .collect::<Option<Vec<_>>>()?;
        Some(AdaptedRow {
            main: row.get(self.range.clone())?,
            scopes,
        })
    }
}

/// A row sliced by a [`RowAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedRow<'a, 'r, T> {
    pub main: &'r [T],
    pub scopes: Vec<(&'a str, AdaptedRow<'a, 'r, T>)>,
}

impl<'a, 'r, T> AdaptedRow<'a, 'r, T> {
    pub fn scope(&self, key: &str) -> Option<&AdaptedRow<'a, 'r, T>> {
        self.scopes
            .iter()
            .find_map(|(k, row)| (*k == key).then_some(row))
    }
}

impl QueryTree {
    /// The adapter of rows fetched by this query, `None` when it has no joins.
    ///
    /// Columns are laid out as the generated SELECT lists them: own selection
    /// first, then each join depth-first, in declaration order.
    pub fn row_adapter(&self, db: &dyn SchemaSource) -> Result<Option<RowAdapter>> {
        if self.joins.is_empty() {
            return Ok(None);
        }
        let (adapter, _) = self.derive_adapter(db, 0)?;
        if adapter.range.is_empty() && adapter.scopes.is_empty() {
            return Ok(None);
        }
        Ok(Some(adapter))
    }

    /// Returns the adapter starting at `start`, and the total width it covers.
    fn derive_adapter(&self, db: &dyn SchemaSource, start: usize) -> Result<(RowAdapter, usize)> {
        let main_end = start + self.own_width(db)?;
        let mut offset = main_end;
        let mut scopes: Vec<(String, RowAdapter)> = Vec::with_capacity(self.joins.len());
        for (key, join) in &self.joins {
            if scopes.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)) {
                return Err(QueryError::AmbiguousAssociationKey { key: key.clone() });
            }
            let (adapter, width) = join.query.derive_adapter(db, offset)?;
            scopes.push((key.clone(), adapter));
            offset += width;
        }
        Ok((
            RowAdapter {
                range: start..main_end,
                scopes,
            },
            offset - start,
        ))
    }
}
