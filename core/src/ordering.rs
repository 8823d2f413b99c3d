//! Ordering terms and lazily reversible orderings.

use crate::alias::TableAlias;
use crate::error::Result;
use crate::expr::SqlExpr;
use crate::generation::RenderScope;
use crate::sql::{SQL, Token};

/// Sort direction of an ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// No direction keyword (the engine sorts ascending)
    #[default]
    Unspecified,
    Asc,
    Desc,
    AscNullsLast,
    DescNullsFirst,
}

impl Direction {
    /// The opposite direction.
    pub const fn reversed(self) -> Self {
        match self {
            Direction::Unspecified | Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
            Direction::AscNullsLast => Direction::DescNullsFirst,
            Direction::DescNullsFirst => Direction::AscNullsLast,
        }
    }

    fn tokens(self) -> &'static [Token] {
        match self {
            Direction::Unspecified => &[],
            Direction::Asc => &[Token::ASC],
            Direction::Desc => &[Token::DESC],
            Direction::AscNullsLast => &[Token::ASC, Token::NULLS_LAST],
            Direction::DescNullsFirst => &[Token::DESC, Token::NULLS_FIRST],
        }
    }
}

/// An expression to sort by, with its direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderingTerm {
    pub expr: SqlExpr,
    pub direction: Direction,
}

impl OrderingTerm {
    pub fn new(expr: SqlExpr, direction: Direction) -> Self {
        Self { expr, direction }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.expr.clone(), self.direction.reversed())
    }

    pub fn qualified(&self, alias: &TableAlias) -> Self {
        Self::new(self.expr.qualified(alias), self.direction)
    }

    pub(crate) fn to_sql(&self, scope: &RenderScope<'_>) -> Result<SQL<'static>> {
        let mut sql = self.expr.to_sql(scope)?;
        for token in self.direction.tokens() {
            sql.push_mut(*token);
        }
        Ok(sql)
    }
}

impl From<SqlExpr> for OrderingTerm {
    fn from(expr: SqlExpr) -> Self {
        Self::new(expr, Direction::Unspecified)
    }
}

impl SqlExpr {
    pub fn asc(self) -> OrderingTerm {
        OrderingTerm::new(self, Direction::Asc)
    }

    pub fn desc(self) -> OrderingTerm {
        OrderingTerm::new(self, Direction::Desc)
    }

    pub fn asc_nulls_last(self) -> OrderingTerm {
        OrderingTerm::new(self, Direction::AscNullsLast)
    }

    pub fn desc_nulls_first(self) -> OrderingTerm {
        OrderingTerm::new(self, Direction::DescNullsFirst)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum OrderingElement {
    Term(OrderingTerm),
    Nested(QueryOrdering),
}

/// A sequence of ordering terms and nested orderings, with one reversal flag
/// covering the whole sequence.
///
/// Reversal is applied when the ordering is resolved, so reversing is O(1) and
/// reaches terms contributed by nested orderings. Flags compose by parity: a
/// reversed ordering nested in a reversed ordering resolves in its original
/// direction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOrdering {
    elements: Vec<OrderingElement>,
    reversed: bool,
}

impl QueryOrdering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_terms<I>(terms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OrderingTerm>,
    {
        Self {
            elements: terms
                .into_iter()
                .map(|term| OrderingElement::Term(term.into()))
                .collect(),
            reversed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.iter().all(|element| match element {
            OrderingElement::Term(_) => false,
            OrderingElement::Nested(nested) => nested.is_empty(),
        })
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Appends a term. It is subject to this ordering's reversal flag.
    pub fn append_term(&mut self, term: impl Into<OrderingTerm>) {
        self.elements.push(OrderingElement::Term(term.into()));
    }

    /// Appends a nested ordering, keeping its own reversal flag.
    pub fn append_ordering(&mut self, ordering: QueryOrdering) {
        if !ordering.elements.is_empty() {
            self.elements.push(OrderingElement::Nested(ordering));
        }
    }

    /// Both orderings in sequence, each keeping its own reversal flag.
    pub fn appending(&self, other: &QueryOrdering) -> QueryOrdering {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut combined = QueryOrdering::new();
        combined.append_ordering(self.clone());
        combined.append_ordering(other.clone());
        combined
    }

    pub fn reversed(&self) -> QueryOrdering {
        QueryOrdering {
            elements: self.elements.clone(),
            reversed: !self.reversed,
        }
    }

    pub fn qualified(&self, alias: &TableAlias) -> QueryOrdering {
        QueryOrdering {
            elements: self
                .elements
                .iter()
                .map(|element| match element {
                    OrderingElement::Term(term) => OrderingElement::Term(term.qualified(alias)),
                    OrderingElement::Nested(nested) => {
                        OrderingElement::Nested(nested.qualified(alias))
                    }
                })
                .collect(),
            reversed: self.reversed,
        }
    }

    /// Flattens the ordering depth-first, applying reversal flags.
    pub fn resolve(&self) -> Vec<OrderingTerm> {
        let mut terms = Vec::new();
        self.resolve_into(false, &mut terms);
        terms
    }

    fn resolve_into(&self, parent_reversed: bool, terms: &mut Vec<OrderingTerm>) {
        let reversed = parent_reversed ^ self.reversed;
        for element in &self.elements {
            match element {
                OrderingElement::Term(term) if reversed => terms.push(term.reversed()),
                OrderingElement::Term(term) => terms.push(term.clone()),
                OrderingElement::Nested(nested) => nested.resolve_into(reversed, terms),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    fn directions(ordering: &QueryOrdering) -> Vec<Direction> {
        ordering.resolve().into_iter().map(|t| t.direction).collect()
    }

    #[test]
    fn test_direction_reversal() {
        assert_eq!(Direction::Unspecified.reversed(), Direction::Desc);
        assert_eq!(Direction::Asc.reversed(), Direction::Desc);
        assert_eq!(Direction::Desc.reversed(), Direction::Asc);
        assert_eq!(Direction::AscNullsLast.reversed(), Direction::DescNullsFirst);
        assert_eq!(Direction::DescNullsFirst.reversed(), Direction::AscNullsLast);
    }

    #[test]
    fn test_reversal_is_self_inverse() {
        let ordering = QueryOrdering::from_terms([col("name").asc(), col("score").desc_nulls_first()]);
        assert_eq!(ordering.reversed().reversed().resolve(), ordering.resolve());
        assert_eq!(
            directions(&ordering.reversed()),
            vec![Direction::Desc, Direction::AscNullsLast]
        );
    }

    #[test]
    fn test_reversal_reaches_nested_terms() {
        let mut parent = QueryOrdering::from_terms([col("name")]);
        parent.append_ordering(QueryOrdering::from_terms([col("age").asc()]));
        assert_eq!(
            directions(&parent.reversed()),
            vec![Direction::Desc, Direction::Desc]
        );
    }

    #[test]
    fn test_nested_reversal_parity() {
        let nested = QueryOrdering::from_terms([col("age").asc()]).reversed();
        let mut parent = QueryOrdering::from_terms([col("name").asc()]);
        parent.append_ordering(nested);
        assert_eq!(directions(&parent), vec![Direction::Asc, Direction::Desc]);
        assert_eq!(
            directions(&parent.reversed()),
            vec![Direction::Desc, Direction::Asc]
        );
    }

    #[test]
    fn test_empty_ordering() {
        let mut ordering = QueryOrdering::new();
        ordering.append_ordering(QueryOrdering::new());
        assert!(ordering.is_empty());
        assert!(ordering.reversed().resolve().is_empty());
    }
}
