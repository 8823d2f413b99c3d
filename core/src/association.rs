//! Associations between tables, and the joins they produce.

use crate::alias::TableAlias;
use crate::error::{QueryError, Result};
use crate::expr::SqlExpr;
use crate::generation::GenerationContext;
use crate::ordering::OrderingTerm;
use crate::query::QueryTree;
use crate::schema::{SchemaSource, same_columns};
use crate::selection::Selection;

/// How a joined table constrains the rows of its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JoinOperator {
    /// `LEFT JOIN`: the associated row may be missing
    Optional,
    /// `JOIN`: the associated row must exist
    Required,
}

/// A foreign key, possibly partially specified, to be resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKeyRequest {
    pub origin_table: String,
    pub destination_table: String,
    pub origin_columns: Option<Vec<String>>,
    pub destination_columns: Option<Vec<String>>,
}

impl ForeignKeyRequest {
    pub fn new(origin_table: impl Into<String>, destination_table: impl Into<String>) -> Self {
        Self {
            origin_table: origin_table.into(),
            destination_table: destination_table.into(),
            origin_columns: None,
            destination_columns: None,
        }
    }

    /// Resolves (origin column, destination column) pairs.
    pub fn resolve(&self, db: &dyn SchemaSource) -> Result<Vec<(String, String)>> {
        if let (Some(origin), Some(destination)) = (&self.origin_columns, &self.destination_columns) {
            if origin.len() != destination.len() || origin.is_empty() {
                return Err(self.not_found());
            }
            return Ok(origin.iter().cloned().zip(destination.iter().cloned()).collect());
        }

        let destination_table = db.canonical_table_name(&self.destination_table)?;
        let candidates: Vec<_> = db
            .foreign_keys(&self.origin_table)?
            .into_iter()
            .filter(|fk| fk.destination_table.eq_ignore_ascii_case(&destination_table))
            .filter(|fk| {
                self.origin_columns.as_ref().is_none_or(|columns| {
                    same_columns(columns.iter().map(String::as_str), fk.origin_columns())
                })
            })
            .filter(|fk| {
                self.destination_columns.as_ref().is_none_or(|columns| {
                    same_columns(columns.iter().map(String::as_str), fk.destination_columns())
                })
            })
            .collect();

        match candidates.len() {
            1 => Ok(candidates.into_iter().flat_map(|fk| fk.mapping).collect()),
            0 => {
                // Origin columns without a declared foreign key refer to the
                // destination primary key.
                let Some(origin) = &self.origin_columns else {
                    return Err(self.not_found());
                };
                let primary_key = db.primary_key(&destination_table)?;
                if primary_key.columns.len() != origin.len() {
                    return Err(self.not_found());
                }
                Ok(origin.iter().cloned().zip(primary_key.columns).collect())
            }
            candidates => Err(QueryError::AmbiguousForeignKey {
                origin: self.origin_table.clone(),
                destination: self.destination_table.clone(),
                candidates,
            }),
        }
    }

    fn not_found(&self) -> QueryError {
        QueryError::ForeignKeyNotFound {
            origin: self.origin_table.clone(),
            destination: self.destination_table.clone(),
        }
    }
}

/// The ON condition between a parent (left) and an associated (right) table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinCondition {
    pub foreign_key: ForeignKeyRequest,
    /// True when the foreign key origin is the parent table
    pub origin_is_left: bool,
}

impl JoinCondition {
    /// `right.col = left.col` for each column pair of the foreign key.
    pub(crate) fn expression(
        &self,
        ctx: &GenerationContext<'_>,
        left: &TableAlias,
        right: &TableAlias,
    ) -> Result<SqlExpr> {
        let mapping = ctx.foreign_key_mapping(&self.foreign_key)?;
        let mut terms = mapping.iter().map(|(origin, destination)| {
            if self.origin_is_left {
                right.column(destination).eq(left.column(origin))
            } else {
                right.column(origin).eq(left.column(destination))
            }
        });
        let first = terms.next().ok_or_else(|| QueryError::ForeignKeyNotFound {
            origin: self.foreign_key.origin_table.clone(),
            destination: self.foreign_key.destination_table.clone(),
        })?;
        Ok(terms.fold(first, |condition, term| condition.and(term)))
    }

    /// Whether both conditions link the same tables in the same direction.
    ///
    /// Only such conditions can resolve to the same column pairs.
    fn links_same_tables(&self, other: &JoinCondition) -> bool {
        let lhs = &self.foreign_key;
        let rhs = &other.foreign_key;
        self.origin_is_left == other.origin_is_left
            && lhs.origin_table.eq_ignore_ascii_case(&rhs.origin_table)
            && lhs.destination_table.eq_ignore_ascii_case(&rhs.destination_table)
    }

    /// Whether both conditions resolve to the same column pairs.
    fn resolves_like(&self, ctx: &GenerationContext<'_>, other: &JoinCondition) -> Result<bool> {
        if self == other {
            return Ok(true);
        }
        if !self.links_same_tables(other) {
            return Ok(false);
        }
        let normalized = |request: &ForeignKeyRequest| -> Result<Vec<(String, String)>> {
            let mut mapping: Vec<_> = ctx
                .foreign_key_mapping(request)?
                .into_iter()
                .map(|(origin, destination)| {
                    (origin.to_ascii_lowercase(), destination.to_ascii_lowercase())
                })
                .collect();
            mapping.sort();
            Ok(mapping)
        };
        Ok(normalized(&self.foreign_key)? == normalized(&other.foreign_key)?)
    }
}

/// A join node: operator, condition, and the associated table's query.
#[derive(Debug, Clone)]
pub struct AssociationJoin {
    pub operator: JoinOperator,
    pub condition: JoinCondition,
    pub query: QueryTree,
    /// Conditions of merged joins that differ from `condition` as written.
    /// They must resolve to the same column pairs.
    pub(crate) merged_conditions: Vec<JoinCondition>,
}

impl AssociationJoin {
    pub fn qualified(&self) -> Result<AssociationJoin> {
        Ok(AssociationJoin {
            operator: self.operator,
            condition: self.condition.clone(),
            query: self.query.qualified()?,
            merged_conditions: self.merged_conditions.clone(),
        })
    }

    /// Merges two joins for the same association key.
    ///
    /// Returns `None` when the conditions link different tables or the nested
    /// queries can't merge. Conditions written differently over the same
    /// tables are checked against the schema when the statement is generated.
    /// The merged join is required if either side is.
    pub fn merged(&self, other: &AssociationJoin) -> Option<AssociationJoin> {
        if !self.condition.links_same_tables(&other.condition) {
            return None;
        }
        let mut merged_conditions = self.merged_conditions.clone();
        for condition in std::iter::once(&other.condition).chain(&other.merged_conditions) {
            if *condition != self.condition && !merged_conditions.contains(condition) {
                merged_conditions.push(condition.clone());
            }
        }
        Some(AssociationJoin {
            operator: self.operator.max(other.operator),
            condition: self.condition.clone(),
            query: self.query.merged(&other.query)?,
            merged_conditions,
        })
    }

    /// Fails when merged conditions resolve to different column pairs.
    pub(crate) fn check_merged_conditions(
        &self,
        ctx: &GenerationContext<'_>,
        key: &str,
    ) -> Result<()> {
        for condition in &self.merged_conditions {
            if !self.condition.resolves_like(ctx, condition)? {
                return Err(QueryError::AmbiguousAssociationKey {
                    key: key.to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// A declared relationship from one table to another.
#[derive(Debug, Clone)]
pub struct Association {
    key: String,
    condition: JoinCondition,
    destination: QueryTree,
}

impl Association {
    /// The origin table holds a foreign key to the destination table.
    pub fn belongs_to(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        Self {
            key: destination.clone(),
            condition: JoinCondition {
                foreign_key: ForeignKeyRequest::new(origin, destination.clone()),
                origin_is_left: true,
            },
            destination: QueryTree::table(destination),
        }
    }

    /// The destination table holds a foreign key to the origin table, at most
    /// one row per origin row.
    pub fn has_one(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        Self {
            key: destination.clone(),
            condition: JoinCondition {
                foreign_key: ForeignKeyRequest::new(destination.clone(), origin),
                origin_is_left: false,
            },
            destination: QueryTree::table(destination),
        }
    }

    /// The destination table holds a foreign key to the origin table.
    pub fn has_many(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::has_one(origin, destination)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn destination(&self) -> &QueryTree {
        &self.destination
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Names the foreign key columns, in the table holding the foreign key.
    pub fn using_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition.foreign_key.origin_columns =
            Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Names the referenced columns, in the table the foreign key points to.
    pub fn referencing<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition.foreign_key.destination_columns =
            Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Transforms the destination query.
    pub fn map_query(mut self, transform: impl FnOnce(QueryTree) -> QueryTree) -> Self {
        self.destination = transform(self.destination);
        self
    }

    pub fn try_map_query(
        mut self,
        transform: impl FnOnce(QueryTree) -> Result<QueryTree>,
    ) -> Result<Self> {
        self.destination = transform(self.destination)?;
        Ok(self)
    }

    pub fn filter(self, predicate: impl Into<SqlExpr>) -> Self {
        let predicate = predicate.into();
        self.map_query(|query| query.filter(predicate))
    }

    pub fn select<I>(self, selection: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Selection>,
    {
        self.map_query(|query| query.select(selection))
    }

    pub fn order<I>(self, terms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OrderingTerm>,
    {
        self.map_query(|query| query.order(terms))
    }

    pub fn aliased(self, alias: &TableAlias) -> Result<Self> {
        self.try_map_query(|query| query.aliased(alias))
    }

    pub fn including_required(self, association: Association) -> Result<Self> {
        self.try_map_query(|query| query.including_required(association))
    }

    pub fn including_optional(self, association: Association) -> Result<Self> {
        self.try_map_query(|query| query.including_optional(association))
    }

    pub fn joining_required(self, association: Association) -> Result<Self> {
        self.try_map_query(|query| query.joining_required(association))
    }

    pub fn joining_optional(self, association: Association) -> Result<Self> {
        self.try_map_query(|query| query.joining_optional(association))
    }

    pub(crate) fn into_join(self, operator: JoinOperator, selected: bool) -> (String, AssociationJoin) {
        let query = if selected {
            self.destination
        } else {
            self.destination.select_nothing()
        };
        (
            self.key,
            AssociationJoin {
                operator,
                condition: self.condition,
                query,
                merged_conditions: Vec::new(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MemorySchema, TableSchema};

    fn schema() -> MemorySchema {
        MemorySchema::new()
            .with_table(
                TableSchema::new("author")
                    .columns(["id", "name"])
                    .integer_primary_key("id"),
            )
            .with_table(
                TableSchema::new("book")
                    .columns(["id", "authorId", "editorId", "title"])
                    .integer_primary_key("id")
                    .foreign_key("author", [("authorId", "id")])
                    .foreign_key("author", [("editorId", "id")]),
            )
            .with_table(TableSchema::new("review").columns(["bookId"]))
    }

    #[test]
    fn test_ambiguous_foreign_key() {
        let request = ForeignKeyRequest::new("book", "author");
        assert!(matches!(
            request.resolve(&schema()),
            Err(QueryError::AmbiguousForeignKey { candidates: 2, .. })
        ));
    }

    #[test]
    fn test_foreign_key_filtered_by_columns() {
        let mut request = ForeignKeyRequest::new("book", "author");
        request.origin_columns = Some(vec!["editorid".to_owned()]);
        assert_eq!(
            request.resolve(&schema()).unwrap(),
            vec![("editorId".to_owned(), "id".to_owned())]
        );
    }

    #[test]
    fn test_undeclared_foreign_key_uses_primary_key() {
        let mut request = ForeignKeyRequest::new("review", "book");
        assert!(matches!(
            request.resolve(&schema()),
            Err(QueryError::ForeignKeyNotFound { .. })
        ));
        request.origin_columns = Some(vec!["bookId".to_owned()]);
        assert_eq!(
            request.resolve(&schema()).unwrap(),
            vec![("bookId".to_owned(), "id".to_owned())]
        );
    }

    #[test]
    fn test_explicit_columns_must_pair_up() {
        let mut request = ForeignKeyRequest::new("book", "author");
        request.origin_columns = Some(vec!["authorId".to_owned(), "editorId".to_owned()]);
        request.destination_columns = Some(vec!["id".to_owned()]);
        assert!(matches!(
            request.resolve(&schema()),
            Err(QueryError::ForeignKeyNotFound { .. })
        ));

        request.origin_columns = Some(vec!["authorId".to_owned()]);
        assert_eq!(
            request.resolve(&schema()).unwrap(),
            vec![("authorId".to_owned(), "id".to_owned())]
        );
    }

    #[test]
    fn test_merge_requires_same_tables() {
        let author = Association::belongs_to("book", "author");
        let (_, required) = author.clone().into_join(JoinOperator::Required, true);
        let (_, optional) = author.into_join(JoinOperator::Optional, true);
        assert_eq!(
            optional.merged(&required).map(|join| join.operator),
            Some(JoinOperator::Required)
        );
        assert_eq!(
            required.merged(&optional).map(|join| join.operator),
            Some(JoinOperator::Required)
        );

        // Same tables: merged now, resolved when the statement is generated.
        let (_, editor) = Association::belongs_to("book", "author")
            .using_columns(["editorId"])
            .into_join(JoinOperator::Required, true);
        let merged = required.merged(&editor).unwrap();
        assert_eq!(merged.merged_conditions.len(), 1);
        assert_eq!(merged.merged(&editor).unwrap().merged_conditions.len(), 1);

        let (_, reviews) =
            Association::has_many("book", "review").into_join(JoinOperator::Required, true);
        assert!(required.merged(&reviews).is_none());
        let (_, books) =
            Association::has_many("author", "book").into_join(JoinOperator::Required, true);
        assert!(required.merged(&books).is_none());
    }
}
