//! SQL generation for qualified query trees.
//!
//! Generation happens in two steps. First every alias reachable from the
//! statement gets its final SQL name, so that distinct occurrences of one table
//! get distinct names. Then each SELECT level renders with a [`RenderScope`]
//! that knows whether column references need an alias prefix.

use std::cell::RefCell;

use compact_str::{CompactString, ToCompactString, format_compact};
use hashbrown::{HashMap, HashSet};

use crate::alias::{AliasKey, TableAlias};
use crate::association::{AssociationJoin, ForeignKeyRequest, JoinOperator};
use crate::error::{QueryError, Result};
use crate::ordering::QueryOrdering;
use crate::query::QueryTree;
use crate::schema::SchemaSource;
use crate::source::Source;
use crate::sql::{SQL, SQLChunk, Token};

type AliasNames = HashMap<AliasKey, CompactString>;

/// Rendering state of one SELECT level.
#[derive(Debug, Clone, Copy)]
pub struct RenderScope<'a> {
    names: Option<&'a AliasNames>,
    qualify_columns: bool,
}

impl<'a> RenderScope<'a> {
    /// A scope outside of any statement: columns render unqualified.
    pub fn detached() -> Self {
        Self {
            names: None,
            qualify_columns: false,
        }
    }

    /// `"alias".` when columns of `qualifier` need a prefix.
    pub(crate) fn prefix(&self, qualifier: Option<&TableAlias>) -> Result<Option<SQL<'static>>> {
        let (Some(alias), Some(names)) = (qualifier, self.names) else {
            return Ok(None);
        };
        let name = alias_name(names, alias)?;
        Ok(self
            .qualify_columns
            .then(|| SQL::ident(name.to_string()).push(Token::DOT)))
    }

    pub(crate) fn column(&self, qualifier: Option<&TableAlias>, name: &str) -> Result<SQL<'static>> {
        let column = SQL::ident(name.to_owned());
        Ok(match self.prefix(qualifier)? {
            Some(prefix) => prefix.append(column),
            None => column,
        })
    }
}

fn alias_name<'n>(names: &'n AliasNames, alias: &TableAlias) -> Result<&'n CompactString> {
    names
        .get(&alias.key())
        .ok_or_else(|| QueryError::UnknownAlias {
            name: alias
                .identity_name()
                .unwrap_or_else(|| "anonymous".to_owned()),
        })
}

/// Statement-wide state: schema access, alias names, resolved foreign keys.
pub(crate) struct GenerationContext<'db> {
    db: &'db dyn SchemaSource,
    names: AliasNames,
    foreign_keys: RefCell<HashMap<ForeignKeyRequest, Vec<(String, String)>>>,
}

impl<'db> GenerationContext<'db> {
    /// Names every alias of the qualified `query`.
    pub(crate) fn new(db: &'db dyn SchemaSource, query: &QueryTree) -> Result<Self> {
        let mut aliases = Vec::new();
        collect_statement_aliases(query, &mut aliases);
        Ok(Self {
            db,
            names: name_aliases(&aliases)?,
            foreign_keys: RefCell::new(HashMap::new()),
        })
    }

    /// Resolves a foreign key once per statement.
    pub(crate) fn foreign_key_mapping(
        &self,
        request: &ForeignKeyRequest,
    ) -> Result<Vec<(String, String)>> {
        if let Some(mapping) = self.foreign_keys.borrow().get(request) {
            return Ok(mapping.clone());
        }
        let mapping = request.resolve(self.db)?;
        self.foreign_keys
            .borrow_mut()
            .insert(request.clone(), mapping.clone());
        Ok(mapping)
    }

    pub(crate) fn scope(&self, query: &QueryTree) -> RenderScope<'_> {
        let mut keys = HashSet::new();
        collect_level_keys(query, &mut keys);
        RenderScope {
            names: Some(&self.names),
            qualify_columns: keys.len() > 1,
        }
    }

    fn name(&self, alias: &TableAlias) -> Result<&CompactString> {
        alias_name(&self.names, alias)
    }

    // ==================== SELECT ====================

    pub(crate) fn select_sql(&self, query: &QueryTree) -> Result<SQL<'static>> {
        let scope = self.scope(query);

        let mut columns = Vec::new();
        collect_selection(query, &scope, &mut columns)?;
        if columns.is_empty() {
            return Err(QueryError::EmptySelection);
        }

        let mut sql = SQL::token(Token::SELECT);
        if query.distinct {
            sql.push_mut(Token::DISTINCT);
        }
        sql.append_mut(SQL::join(columns, Token::COMMA));
        sql.push_mut(Token::FROM);
        sql.append_mut(self.source_sql(&query.source, &scope)?);

        let left = source_alias(query)?;
        for (key, join) in &query.joins {
            self.join_sql(key, join, left, true, &scope, &mut sql)?;
        }

        if let Some(filter) = &query.filter {
            sql.push_mut(Token::WHERE);
            sql.append_mut(filter.resolve(self.db)?.to_sql(&scope)?);
        }

        if let Some(group) = &query.group {
            let group = group.resolve(self.db)?;
            if !group.is_empty() {
                let exprs = group
                    .iter()
                    .map(|expr| expr.to_sql(&scope))
                    .collect::<Result<Vec<_>>>()?;
                sql.push_mut(Token::GROUP_BY);
                sql.append_mut(SQL::join(exprs, Token::COMMA));
            }
        }

        if let Some(having) = &query.having {
            sql.push_mut(Token::HAVING);
            sql.append_mut(having.to_sql(&scope)?);
        }

        self.append_ordering(&full_ordering(query), &scope, &mut sql)?;

        if let Some(limit) = query.limit {
            sql.push_mut(Token::LIMIT);
            sql.push_mut(SQLChunk::Number(limit.limit));
            if let Some(offset) = limit.offset {
                sql.push_mut(Token::OFFSET);
                sql.push_mut(SQLChunk::Number(offset));
            }
        }

        Ok(sql)
    }

    fn append_ordering(
        &self,
        ordering: &QueryOrdering,
        scope: &RenderScope<'_>,
        sql: &mut SQL<'static>,
    ) -> Result<()> {
        let terms = ordering
            .resolve()
            .iter()
            .map(|term| term.to_sql(scope))
            .collect::<Result<Vec<_>>>()?;
        if !terms.is_empty() {
            sql.push_mut(Token::ORDER_BY);
            sql.append_mut(SQL::join(terms, Token::COMMA));
        }
        Ok(())
    }

    fn source_sql(&self, source: &Source, scope: &RenderScope<'_>) -> Result<SQL<'static>> {
        match source {
            Source::Table { name, alias } => {
                let sql = SQL::ident(name.clone());
                Ok(match alias {
                    Some(alias) => {
                        let alias_name = self.name(alias)?;
                        if alias_name == name.as_str() {
                            sql
                        } else {
                            sql.alias(alias_name.to_string())
                        }
                    }
                    None => sql,
                })
            }
            Source::SubQuery { query, alias } => {
                let sql = self.select_sql(query)?.parens();
                Ok(match alias {
                    Some(alias) if alias.user_name().is_some() || scope.qualify_columns => {
                        sql.alias(self.name(alias)?.to_string())
                    }
                    _ => sql,
                })
            }
        }
    }

    fn join_sql(
        &self,
        key: &str,
        join: &AssociationJoin,
        left: &TableAlias,
        allow_required: bool,
        scope: &RenderScope<'_>,
        sql: &mut SQL<'static>,
    ) -> Result<()> {
        let unsupported = if join.query.group.is_some() {
            Some("GROUP BY")
        } else if join.query.having.is_some() {
            Some("HAVING")
        } else if join.query.limit.is_some() {
            Some("LIMIT")
        } else if join.query.distinct {
            Some("DISTINCT")
        } else {
            None
        };
        if let Some(clause) = unsupported {
            return Err(QueryError::InvalidJoin {
                key: key.to_owned(),
                clause,
            });
        }
        join.check_merged_conditions(self, key)?;

        // Nothing beneath a LEFT JOIN may be required.
        let allow_required = match join.operator {
            JoinOperator::Optional => {
                sql.push_mut(Token::LEFT_JOIN);
                false
            }
            JoinOperator::Required if allow_required => {
                sql.push_mut(Token::JOIN);
                true
            }
            JoinOperator::Required => {
                return Err(QueryError::RequiredJoinBehindOptional {
                    key: key.to_owned(),
                });
            }
        };
        sql.append_mut(self.source_sql(&join.query.source, scope)?);

        let right = source_alias(&join.query)?;
        let mut condition = join.condition.expression(self, left, right)?;
        if let Some(filter) = &join.query.filter {
            condition = condition.and(filter.resolve(self.db)?);
        }
        sql.push_mut(Token::ON);
        sql.append_mut(condition.to_sql(scope)?);

        for (key, nested) in &join.query.joins {
            self.join_sql(key, nested, right, allow_required, scope, sql)?;
        }
        Ok(())
    }

    // ==================== DELETE ====================

    pub(crate) fn delete_sql(&self, query: &QueryTree) -> Result<SQL<'static>> {
        if query.group.is_some() {
            return Err(QueryError::InvalidDelete("GROUP BY is not supported"));
        }
        if query.having.is_some() {
            return Err(QueryError::InvalidDelete("HAVING is not supported"));
        }
        if !query.joins.is_empty() {
            return Err(QueryError::InvalidDelete("joins are not supported"));
        }
        if query.source.table_name().is_none() {
            return Err(QueryError::InvalidDelete("only tables can be deleted from"));
        }

        let scope = self.scope(query);
        let mut sql = SQL::token(Token::DELETE_FROM);
        sql.append_mut(self.source_sql(&query.source, &scope)?);

        if let Some(filter) = &query.filter {
            sql.push_mut(Token::WHERE);
            sql.append_mut(filter.resolve(self.db)?.to_sql(&scope)?);
        }

        // Without LIMIT, ordering is meaningless.
        if let Some(limit) = query.limit {
            if !self.db.supports_delete_limit() {
                return Err(QueryError::DeleteLimitUnsupported);
            }
            self.append_ordering(&query.ordering, &scope, &mut sql)?;
            sql.push_mut(Token::LIMIT);
            sql.push_mut(SQLChunk::Number(limit.limit));
            if let Some(offset) = limit.offset {
                sql.push_mut(Token::OFFSET);
                sql.push_mut(SQLChunk::Number(offset));
            }
        }

        Ok(sql)
    }
}

fn source_alias(query: &QueryTree) -> Result<&TableAlias> {
    query.source.alias().ok_or_else(|| QueryError::UnknownAlias {
        name: query
            .source
            .table_name()
            .unwrap_or("subquery")
            .to_owned(),
    })
}

/// Own ordering, then the orderings of joins, depth-first. The reversal flag
/// of `query` covers the orderings of its joins.
fn full_ordering(query: &QueryTree) -> QueryOrdering {
    let mut ordering = query.ordering.clone();
    for (_, join) in &query.joins {
        ordering.append_ordering(full_ordering(&join.query));
    }
    ordering
}

fn collect_selection(
    query: &QueryTree,
    scope: &RenderScope<'_>,
    columns: &mut Vec<SQL<'static>>,
) -> Result<()> {
    for selection in &query.selection {
        columns.push(selection.to_sql(scope)?);
    }
    for (_, join) in &query.joins {
        collect_selection(&join.query, scope, columns)?;
    }
    Ok(())
}

/// Aliases visible in the FROM clause of one SELECT level.
fn collect_level_keys(query: &QueryTree, keys: &mut HashSet<AliasKey>) {
    if let Some(alias) = query.source.alias() {
        keys.insert(alias.key());
    }
    for (_, join) in &query.joins {
        collect_level_keys(&join.query, keys);
    }
}

/// Every alias of the statement, sub-queries included, in order of appearance.
fn collect_statement_aliases(query: &QueryTree, aliases: &mut Vec<TableAlias>) {
    if let Some(alias) = query.source.alias() {
        aliases.push(alias.clone());
    }
    if let Source::SubQuery { query: nested, .. } = &query.source {
        collect_statement_aliases(nested, aliases);
    }
    for (_, join) in &query.joins {
        collect_statement_aliases(&join.query, aliases);
    }
}

/// Gives each distinct occurrence a unique name.
///
/// User names are kept, and two occurrences with the same user name are an
/// error. Other names collide case-insensitively; colliding ones get a numeric
/// suffix: `player1`, `player2`...
fn name_aliases(aliases: &[TableAlias]) -> Result<AliasNames> {
    struct Entry {
        key: AliasKey,
        name: CompactString,
        user: bool,
    }

    let mut seen = HashSet::new();
    let entries: Vec<Entry> = aliases
        .iter()
        .filter(|alias| seen.insert(alias.key()))
        .map(|alias| {
            let user = alias.user_name();
            Entry {
                key: alias.key(),
                user: user.is_some(),
                name: user
                    .or_else(|| alias.table_name())
                    .unwrap_or_else(|| "subquery".to_owned())
                    .to_compact_string(),
            }
        })
        .collect();

    let mut counts: HashMap<CompactString, usize> = HashMap::new();
    let mut user_names = HashSet::new();
    for entry in &entries {
        let lowercased = entry.name.to_lowercase();
        if entry.user && !user_names.insert(lowercased.clone()) {
            return Err(QueryError::AmbiguousAlias {
                name: entry.name.to_string(),
            });
        }
        *counts.entry(lowercased).or_default() += 1;
    }

    let mut taken: HashSet<CompactString> = counts.keys().cloned().collect();
    let mut names = AliasNames::new();
    for entry in entries {
        let lowercased = entry.name.to_lowercase();
        if entry.user || counts.get(&lowercased).is_some_and(|count| *count == 1) {
            names.insert(entry.key, entry.name);
            continue;
        }
        let mut suffix = 1usize;
        let name = loop {
            let candidate = format_compact!("{}{}", entry.name, suffix);
            if taken.insert(candidate.to_lowercase()) {
                break candidate;
            }
            suffix += 1;
        };
        names.insert(entry.key, name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(table: &str) -> TableAlias {
        let alias = TableAlias::new();
        alias.bind(table).unwrap();
        alias
    }

    fn names_of(aliases: &[TableAlias]) -> Vec<String> {
        let names = name_aliases(aliases).unwrap();
        aliases
            .iter()
            .map(|alias| names[&alias.key()].to_string())
            .collect()
    }

    #[test]
    fn test_unique_names_are_kept() {
        assert_eq!(
            names_of(&[bound("book"), bound("author")]),
            vec!["book", "author"]
        );
    }

    #[test]
    fn test_colliding_names_get_suffixes() {
        assert_eq!(
            names_of(&[bound("player"), bound("Player"), bound("player1")]),
            vec!["player2", "Player3", "player1"]
        );
    }

    #[test]
    fn test_user_name_wins_collision() {
        let user = TableAlias::named("player");
        user.bind("team").unwrap();
        assert_eq!(names_of(&[bound("player"), user]), vec!["player1", "player"]);
    }

    #[test]
    fn test_proxies_share_a_name() {
        let base = bound("player");
        let proxy = TableAlias::new();
        proxy.become_proxy_of(&base).unwrap();
        let names = name_aliases(&[base.clone(), proxy.clone()]).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[&proxy.key()], "player");
    }

    #[test]
    fn test_duplicate_user_names_fail() {
        let a = TableAlias::named("p");
        let b = TableAlias::named("P");
        assert!(matches!(
            name_aliases(&[a, b]),
            Err(QueryError::AmbiguousAlias { .. })
        ));
    }

    #[test]
    fn test_unknown_alias() {
        let scope_names = AliasNames::new();
        let scope = RenderScope {
            names: Some(&scope_names),
            qualify_columns: true,
        };
        assert!(matches!(
            scope.column(Some(&TableAlias::named("ghost")), "id"),
            Err(QueryError::UnknownAlias { .. })
        ));
    }
}
