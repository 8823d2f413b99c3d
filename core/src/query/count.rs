use super::QueryTree;
use crate::expr::SqlExpr;
use crate::selection::Selection;

impl QueryTree {
    /// A query whose single row holds the number of rows of `self`.
    ///
    /// Simple requests are rewritten in place (`SELECT COUNT(*) FROM t`,
    /// `SELECT COUNT(DISTINCT e) FROM t`). Others are wrapped:
    /// `SELECT COUNT(*) FROM (SELECT ...)`. Ordering is never kept.
    pub fn count_query(&self) -> QueryTree {
        let query = self.clone().unordered();

        if query.group.is_some() || query.limit.is_some() {
            return query.wrapped_count();
        }
        if !query.joins.is_empty() || query.source.table_name().is_none() {
            return query.wrapped_count();
        }

        match query.selection.as_slice() {
            [selection] => match selection.count_expr(query.distinct) {
                Some(count) => query.counting(count),
                None => query.wrapped_count(),
            },
            _ if !query.distinct => query.counting(SqlExpr::CountAll),
            _ => query.wrapped_count(),
        }
    }

    fn counting(mut self, count: SqlExpr) -> QueryTree {
        self.selection = vec![Selection::expr(count)];
        self.distinct = false;
        self
    }

    fn wrapped_count(self) -> QueryTree {
        QueryTree::from_subquery(self).select([SqlExpr::CountAll])
    }
}
