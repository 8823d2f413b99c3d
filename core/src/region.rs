//! Database regions: the tables, and possibly the rows, a statement touches.

use std::collections::{BTreeMap, BTreeSet};

use crate::alias::TableAlias;
use crate::error::Result;
use crate::expr::{BinaryOp, SqlExpr};
use crate::query::QueryTree;
use crate::schema::SchemaSource;
use crate::source::Source;
use crate::value::Value;

/// A set of tables, each optionally narrowed to some row ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DatabaseRegion {
    /// Every table, every row
    Full,
    /// Table names (lowercased) to row ids; `None` means all rows
    Tables(BTreeMap<String, Option<BTreeSet<i64>>>),
    /// Nothing
    #[default]
    Empty,
}

impl DatabaseRegion {
    /// All rows of one table.
    pub fn table(name: &str) -> Self {
        DatabaseRegion::Tables(BTreeMap::from([(name.to_ascii_lowercase(), None)]))
    }

    /// Some rows of one table.
    pub fn rows(name: &str, row_ids: impl IntoIterator<Item = i64>) -> Self {
        let row_ids: BTreeSet<i64> = row_ids.into_iter().collect();
        if row_ids.is_empty() {
            return DatabaseRegion::Empty;
        }
        DatabaseRegion::Tables(BTreeMap::from([(name.to_ascii_lowercase(), Some(row_ids))]))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DatabaseRegion::Empty => true,
            DatabaseRegion::Full => false,
            DatabaseRegion::Tables(tables) => tables.is_empty(),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, DatabaseRegion::Full)
    }

    /// Whether the region covers the given row.
    pub fn contains(&self, table: &str, row_id: i64) -> bool {
        match self {
            DatabaseRegion::Full => true,
            DatabaseRegion::Empty => false,
            DatabaseRegion::Tables(tables) => tables
                .get(&table.to_ascii_lowercase())
                .is_some_and(|rows| rows.as_ref().is_none_or(|rows| rows.contains(&row_id))),
        }
    }

    /// Whether the region covers some rows of the given table.
    pub fn contains_table(&self, table: &str) -> bool {
        match self {
            DatabaseRegion::Full => true,
            DatabaseRegion::Empty => false,
            DatabaseRegion::Tables(tables) => tables.contains_key(&table.to_ascii_lowercase()),
        }
    }

    pub fn union(&self, other: &DatabaseRegion) -> DatabaseRegion {
        match (self, other) {
            (DatabaseRegion::Full, _) | (_, DatabaseRegion::Full) => DatabaseRegion::Full,
            (DatabaseRegion::Empty, region) | (region, DatabaseRegion::Empty) => region.clone(),
            (DatabaseRegion::Tables(lhs), DatabaseRegion::Tables(rhs)) => {
                let mut tables = lhs.clone();
                for (table, rows) in rhs {
                    let merged = match (tables.get(table), rows) {
                        (Some(Some(lhs)), Some(rhs)) => Some(lhs.union(rhs).copied().collect()),
                        (Some(_), _) => None,
                        (None, rows) => rows.clone(),
                    };
                    tables.insert(table.clone(), merged);
                }
                DatabaseRegion::Tables(tables)
            }
        }
    }

    pub fn intersection(&self, other: &DatabaseRegion) -> DatabaseRegion {
        match (self, other) {
            (DatabaseRegion::Empty, _) | (_, DatabaseRegion::Empty) => DatabaseRegion::Empty,
            (DatabaseRegion::Full, region) | (region, DatabaseRegion::Full) => region.clone(),
            (DatabaseRegion::Tables(lhs), DatabaseRegion::Tables(rhs)) => {
                let mut tables = BTreeMap::new();
                for (table, rows) in lhs {
                    let Some(other_rows) = rhs.get(table) else {
                        continue;
                    };
                    let rows = match (rows, other_rows) {
                        (Some(lhs), Some(rhs)) => {
                            let rows: BTreeSet<i64> = lhs.intersection(rhs).copied().collect();
                            if rows.is_empty() {
                                continue;
                            }
                            Some(rows)
                        }
                        (Some(rows), None) | (None, Some(rows)) => Some(rows.clone()),
                        (None, None) => None,
                    };
                    tables.insert(table.clone(), rows);
                }
                if tables.is_empty() {
                    DatabaseRegion::Empty
                } else {
                    DatabaseRegion::Tables(tables)
                }
            }
        }
    }
}

impl QueryTree {
    /// Tables read by this query, narrowed to row ids when the filter allows it.
    ///
    /// Narrowing is best effort: whenever the filter can't be reduced to row
    /// ids of the source table, the whole table is reported.
    pub fn affected_region(&self, db: &dyn SchemaSource) -> Result<DatabaseRegion> {
        let query = self.qualified()?;
        let mut region = DatabaseRegion::Empty;
        let mut occurrences = Vec::new();
        for table in query.table_names() {
            let table = db.canonical_table_name(table)?.to_ascii_lowercase();
            region = region.union(&DatabaseRegion::table(&table));
            occurrences.push(table);
        }

        let Source::Table { name, .. } = &query.source else {
            return Ok(region);
        };
        let table = db.canonical_table_name(name)?.to_ascii_lowercase();
        // Other occurrences of the source table read all of its rows.
        if occurrences.iter().filter(|other| **other == table).count() > 1 {
            crate::quarry_trace_fallback!("region", "source table is read more than once");
            return Ok(region);
        }
        match query.row_ids(db) {
            Ok(Some(row_ids)) => {
                if let DatabaseRegion::Tables(tables) = &mut region {
                    tables.insert(table, Some(row_ids));
                    tables.retain(|_, rows| rows.as_ref().is_none_or(|rows| !rows.is_empty()));
                    if tables.is_empty() {
                        region = DatabaseRegion::Empty;
                    }
                }
            }
            Ok(None) => {}
            Err(_err) => {
                crate::quarry_trace_fallback!("region", _err);
            }
        }
        Ok(region)
    }

    fn table_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        match &self.source {
            Source::Table { name, .. } => names.push(name.as_str()),
            Source::SubQuery { query, .. } => names.extend(query.table_names()),
        }
        for (_, join) in &self.joins {
            names.extend(join.query.table_names());
        }
        names
    }

    /// Row ids selected by the filter of a qualified query, when the filter
    /// reduces to row id comparisons.
    fn row_ids(&self, db: &dyn SchemaSource) -> Result<Option<BTreeSet<i64>>> {
        let Source::Table { name, alias } = &self.source else {
            return Ok(None);
        };
        let primary_key = db.primary_key(name)?;
        let Some(row_id_column) = primary_key.row_id_column() else {
            crate::quarry_trace_fallback!("region", "primary key is not the row id");
            return Ok(None);
        };
        let Some(filter) = &self.filter else {
            return Ok(None);
        };
        let filter = filter.resolve(db)?;
        let matcher = RowIdColumn {
            column: row_id_column,
            alias: alias.as_ref(),
        };
        let row_ids = matcher.row_ids(&filter);
        if row_ids.is_none() {
            crate::quarry_trace_fallback!("region", "filter does not reduce to row ids");
        }
        Ok(row_ids)
    }
}

struct RowIdColumn<'a> {
    column: &'a str,
    alias: Option<&'a TableAlias>,
}

impl RowIdColumn<'_> {
    fn matches(&self, expr: &SqlExpr) -> bool {
        let SqlExpr::Column { name, qualifier } = expr else {
            return false;
        };
        let is_row_id = ["rowid", "_rowid_", "oid", self.column]
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(name));
        let same_table = match (qualifier, self.alias) {
            (None, _) => true,
            (Some(qualifier), Some(alias)) => qualifier.is_same_occurrence(alias),
            (Some(_), None) => false,
        };
        is_row_id && same_table
    }

    fn value(expr: &SqlExpr) -> Option<Option<i64>> {
        match expr {
            SqlExpr::Value(Value::Null) => Some(None),
            SqlExpr::Value(Value::Integer(id)) => Some(Some(*id)),
            _ => None,
        }
    }

    fn row_ids(&self, expr: &SqlExpr) -> Option<BTreeSet<i64>> {
        match expr {
            SqlExpr::Binary {
                op: BinaryOp::Eq | BinaryOp::Is,
                lhs,
                rhs,
            } => {
                let value = if self.matches(lhs) {
                    Self::value(rhs)?
                } else if self.matches(rhs) {
                    Self::value(lhs)?
                } else {
                    return None;
                };
                Some(value.into_iter().collect())
            }
            SqlExpr::In {
                expr,
                list,
                negated: false,
            } if self.matches(expr) => list
                .iter()
                .map(Self::value)
                .collect::<Option<Vec<_>>>()
                .map(|ids| ids.into_iter().flatten().collect()),
            SqlExpr::And(terms) => terms
                .iter()
                .filter_map(|term| self.row_ids(term))
                .reduce(|lhs, rhs| lhs.intersection(&rhs).copied().collect()),
            SqlExpr::Or(terms) if !terms.is_empty() => terms
                .iter()
                .map(|term| self.row_ids(term))
                .collect::<Option<Vec<_>>>()
                .map(|sets| sets.into_iter().flatten().collect()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union() {
        let a = DatabaseRegion::rows("player", [1, 2]);
        let b = DatabaseRegion::rows("Player", [3]);
        let union = a.union(&b);
        assert!(union.contains("player", 3));
        assert!(!union.contains("player", 4));
        assert_eq!(
            a.union(&DatabaseRegion::table("player")),
            DatabaseRegion::table("player")
        );
        assert_eq!(a.union(&DatabaseRegion::Full), DatabaseRegion::Full);
        assert_eq!(DatabaseRegion::Empty.union(&b), b);
    }

    #[test]
    fn test_intersection() {
        let a = DatabaseRegion::rows("player", [1, 2]);
        let b = DatabaseRegion::rows("player", [2, 3]);
        assert_eq!(a.intersection(&b), DatabaseRegion::rows("player", [2]));
        assert!(
            a.intersection(&DatabaseRegion::rows("player", [4]))
                .is_empty()
        );
        assert_eq!(
            a.intersection(&DatabaseRegion::table("player")),
            a
        );
        assert!(a.intersection(&DatabaseRegion::table("team")).is_empty());
    }

    #[test]
    fn test_rows_of_nothing_is_empty() {
        assert!(DatabaseRegion::rows("player", []).is_empty());
        assert!(!DatabaseRegion::table("player").is_empty());
        assert!(DatabaseRegion::Full.contains_table("anything"));
    }
}
