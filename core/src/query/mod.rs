//! The query tree: source, selection, filter, grouping, ordering, limit and
//! joins to associated tables.
//!
//! Every derivation consumes the tree and returns a new one. SQL is produced
//! from a qualified copy, see [`QueryTree::qualified`] and [`crate::generation`].

mod count;
mod keys;

use crate::alias::TableAlias;
use crate::association::{Association, AssociationJoin, JoinOperator};
use crate::deferred::Deferred;
use crate::error::{QueryError, Result};
use crate::expr::SqlExpr;
use crate::ordering::{OrderingTerm, QueryOrdering};
use crate::schema::SchemaSource;
use crate::selection::Selection;
use crate::source::Source;

/// `LIMIT n [OFFSET m]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub limit: usize,
    pub offset: Option<usize>,
}

/// An immutable description of a SELECT (or DELETE) request.
#[derive(Debug, Clone)]
pub struct QueryTree {
    pub(crate) source: Source,
    pub(crate) selection: Vec<Selection>,
    pub(crate) distinct: bool,
    pub(crate) filter: Option<Deferred<SqlExpr>>,
    pub(crate) group: Option<Deferred<Vec<SqlExpr>>>,
    pub(crate) having: Option<SqlExpr>,
    pub(crate) ordering: QueryOrdering,
    pub(crate) limit: Option<Limit>,
    pub(crate) joins: Vec<(String, AssociationJoin)>,
    qualified: bool,
}

impl QueryTree {
    // ==================== constructors ====================

    /// `SELECT * FROM <table>`
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(Source::table(name))
    }

    /// `SELECT * FROM (<query>)`
    pub fn from_subquery(query: QueryTree) -> Self {
        Self::new(Source::subquery(query))
    }

    fn new(source: Source) -> Self {
        Self {
            source,
            selection: vec![Selection::all()],
            distinct: false,
            filter: None,
            group: None,
            having: None,
            ordering: QueryOrdering::new(),
            limit: None,
            joins: Vec::new(),
            qualified: false,
        }
    }

    // ==================== accessors ====================

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn selection(&self) -> &[Selection] {
        &self.selection
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn ordering(&self) -> &QueryOrdering {
        &self.ordering
    }

    pub fn limit_clause(&self) -> Option<Limit> {
        self.limit
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    pub fn is_grouped(&self) -> bool {
        self.group.is_some()
    }

    pub fn is_qualified(&self) -> bool {
        self.qualified
    }

    /// Joins in declaration order.
    pub fn joins(&self) -> impl Iterator<Item = (&str, &AssociationJoin)> {
        self.joins.iter().map(|(key, join)| (key.as_str(), join))
    }

    pub fn join(&self, key: &str) -> Option<&AssociationJoin> {
        self.joins
            .iter()
            .find_map(|(k, join)| (k == key).then_some(join))
    }

    // ==================== derivations ====================

    /// Replaces the selection.
    pub fn select<I>(mut self, selection: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Selection>,
    {
        self.selection = selection.into_iter().map(Into::into).collect();
        self
    }

    /// Appends to the selection.
    pub fn annotated<I>(mut self, selection: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Selection>,
    {
        self.selection.extend(selection.into_iter().map(Into::into));
        self
    }

    pub(crate) fn select_nothing(mut self) -> Self {
        self.selection.clear();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Adds a predicate, AND-combined with the existing filter.
    pub fn filter(self, predicate: impl Into<SqlExpr>) -> Self {
        self.filter_deferred(Deferred::value(predicate.into()))
    }

    /// Adds a predicate computed from the schema.
    pub fn filter_with<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn SchemaSource) -> Result<SqlExpr> + Send + Sync + 'static,
    {
        self.filter_deferred(Deferred::new(predicate))
    }

    pub(crate) fn filter_deferred(mut self, predicate: Deferred<SqlExpr>) -> Self {
        self.filter = Some(match self.filter {
            Some(filter) => filter.zip_with(&predicate, |lhs, rhs| lhs.and(rhs)),
            None => predicate,
        });
        self
    }

    /// Replaces the GROUP BY expressions.
    pub fn group<I>(mut self, expressions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SqlExpr>,
    {
        let expressions: Vec<SqlExpr> = expressions.into_iter().map(Into::into).collect();
        self.group = Some(Deferred::value(expressions));
        self
    }

    /// Adds a HAVING predicate, AND-combined with the existing one.
    pub fn having(mut self, predicate: impl Into<SqlExpr>) -> Self {
        let predicate = predicate.into();
        self.having = Some(match self.having {
            Some(having) => having.and(predicate),
            None => predicate,
        });
        self
    }

    /// Replaces the ordering.
    pub fn order<I>(mut self, terms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OrderingTerm>,
    {
        self.ordering = QueryOrdering::from_terms(terms);
        self
    }

    /// Reverses the ordering, including orderings of joined queries.
    pub fn reversed(mut self) -> Self {
        self.ordering = self.ordering.reversed();
        self
    }

    /// Removes the ordering, including orderings of joined queries.
    pub fn unordered(mut self) -> Self {
        self.ordering = QueryOrdering::new();
        for (_, join) in &mut self.joins {
            join.query = join.query.clone().unordered();
        }
        self
    }

    pub fn limit(mut self, limit: usize, offset: Option<usize>) -> Self {
        self.limit = Some(Limit { limit, offset });
        self
    }

    /// Names the source occurrence with `alias`.
    ///
    /// An alias already given to the source becomes a proxy of `alias`.
    pub fn aliased(mut self, alias: &TableAlias) -> Result<Self> {
        if let Some(existing) = self.source.alias() {
            existing.become_proxy_of(alias)?;
        }
        self.source = self.source.aliased(alias);
        Ok(self)
    }

    /// Adds a join under `key`, merging with an existing join for the same key.
    pub fn appending_join(mut self, key: impl Into<String>, join: AssociationJoin) -> Result<Self> {
        let key = key.into();
        match self.joins.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                let merged = existing.merged(&join);
                crate::quarry_trace_merge!(key, merged.is_some());
                *existing = merged.ok_or(QueryError::AmbiguousAssociationKey { key })?;
            }
            None => self.joins.push((key, join)),
        }
        Ok(self)
    }

    fn appending_association(
        self,
        association: Association,
        operator: JoinOperator,
        selected: bool,
    ) -> Result<Self> {
        let (key, join) = association.into_join(operator, selected);
        self.appending_join(key, join)
    }

    /// Joins and selects an association whose row must exist.
    pub fn including_required(self, association: Association) -> Result<Self> {
        self.appending_association(association, JoinOperator::Required, true)
    }

    /// Left-joins and selects an association.
    pub fn including_optional(self, association: Association) -> Result<Self> {
        self.appending_association(association, JoinOperator::Optional, true)
    }

    /// Joins an association without selecting its columns.
    pub fn joining_required(self, association: Association) -> Result<Self> {
        self.appending_association(association, JoinOperator::Required, false)
    }

    /// Left-joins an association without selecting its columns.
    pub fn joining_optional(self, association: Association) -> Result<Self> {
        self.appending_association(association, JoinOperator::Optional, false)
    }

    // ==================== qualification ====================

    /// Gives the source a fresh alias and qualifies every column reference with it.
    ///
    /// Joined queries are qualified recursively, each with its own alias.
    /// Qualifying a qualified tree returns it unchanged.
    pub fn qualified(&self) -> Result<QueryTree> {
        if self.qualified {
            return Ok(self.clone());
        }
        let alias = TableAlias::new();
        let source = self.source.qualified(&alias)?;

        let filter = self.filter.as_ref().map(|filter| {
            let alias = alias.clone();
            filter.map(move |expr| expr.qualified(&alias))
        });
        let group = self.group.as_ref().map(|group| {
            let alias = alias.clone();
            group.map(move |exprs| exprs.iter().map(|expr| expr.qualified(&alias)).collect())
        });
        let joins = self
            .joins
            .iter()
            .map(|(key, join)| Ok((key.clone(), join.qualified()?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryTree {
            source,
            selection: self
                .selection
                .iter()
                .map(|selection| selection.qualified(&alias))
                .collect(),
            distinct: self.distinct,
            filter,
            group,
            having: self.having.as_ref().map(|having| having.qualified(&alias)),
            ordering: self.ordering.qualified(&alias),
            limit: self.limit,
            joins,
            qualified: true,
        })
    }

    // ==================== merge ====================

    /// Merges two queries on the same table occurrence.
    ///
    /// The later non-empty selection wins, filters and HAVING clauses are
    /// AND-combined, orderings are appended, and joins merge by key.
    pub fn merged(&self, other: &QueryTree) -> Option<QueryTree> {
        let source = self.source.merged(&other.source)?;

        let mut joins = self.joins.clone();
        for (key, join) in &other.joins {
            match joins.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = existing.merged(join)?,
                None => joins.push((key.clone(), join.clone())),
            }
        }

        let filter = match (&self.filter, &other.filter) {
            (Some(lhs), Some(rhs)) => Some(lhs.zip_with(rhs, |lhs, rhs| lhs.and(rhs))),
            (lhs, rhs) => lhs.clone().or_else(|| rhs.clone()),
        };
        let having = match (&self.having, &other.having) {
            (Some(lhs), Some(rhs)) => Some(lhs.clone().and(rhs.clone())),
            (lhs, rhs) => lhs.clone().or_else(|| rhs.clone()),
        };
        let selection = if other.selection.is_empty() {
            self.selection.clone()
        } else {
            other.selection.clone()
        };

        Some(QueryTree {
            source,
            selection,
            distinct: self.distinct || other.distinct,
            filter,
            group: other.group.clone().or_else(|| self.group.clone()),
            having,
            ordering: self.ordering.appending(&other.ordering),
            limit: other.limit.or(self.limit),
            joins,
            qualified: false,
        })
    }

    // ==================== widths ====================

    /// Number of columns selected by this query and its joins.
    pub fn selection_width(&self, db: &dyn SchemaSource) -> Result<usize> {
        let mut width = self.own_width(db)?;
        for (_, join) in &self.joins {
            width += join.query.selection_width(db)?;
        }
        Ok(width)
    }

    /// Number of columns selected by this query, joins excluded.
    pub(crate) fn own_width(&self, db: &dyn SchemaSource) -> Result<usize> {
        self.selection
            .iter()
            .try_fold(0, |width, selection| -> Result<usize> {
                Ok(width + selection.column_count(db, &self.source)?)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    #[test]
    fn test_derivations_leave_original_untouched() {
        let base = QueryTree::table("player");
        let filtered = base.clone().filter(col("score").gt(10)).limit(5, None);
        assert!(!base.has_filter());
        assert!(base.limit_clause().is_none());
        assert!(filtered.has_filter());
        assert_eq!(filtered.limit_clause(), Some(Limit { limit: 5, offset: None }));
    }

    #[test]
    fn test_qualify_twice_is_stable() {
        let query = QueryTree::table("player").qualified().unwrap();
        let again = query.qualified().unwrap();
        assert!(again.is_qualified());
        assert!(
            again
                .source()
                .alias()
                .unwrap()
                .is_same_occurrence(query.source().alias().unwrap())
        );
    }

    #[test]
    fn test_qualify_binds_user_alias() {
        let alias = TableAlias::named("p");
        let query = QueryTree::table("player")
            .aliased(&alias)
            .unwrap()
            .qualified()
            .unwrap();
        assert!(query.source().alias().unwrap().is_same_occurrence(&alias));
        assert_eq!(alias.table_name().as_deref(), Some("player"));
    }

    #[test]
    fn test_merge_keeps_later_selection() {
        let a = QueryTree::table("author").select([col("id")]);
        let b = QueryTree::table("author").select([col("name")]);
        let merged = a.merged(&b).unwrap();
        assert_eq!(merged.selection(), &[Selection::expr(col("name"))]);

        let empty = QueryTree::table("author").select_nothing();
        assert_eq!(a.merged(&empty).unwrap().selection(), a.selection());
        assert!(a.merged(&QueryTree::table("book")).is_none());
    }
}
