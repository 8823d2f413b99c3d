use crate::alias::TableAlias;
use crate::error::Result;
use crate::query::QueryTree;
use crate::schema::SchemaSource;

/// What a query selects from.
#[derive(Debug, Clone)]
pub enum Source {
    Table {
        name: String,
        alias: Option<TableAlias>,
    },
    SubQuery {
        query: Box<QueryTree>,
        alias: Option<TableAlias>,
    },
}

impl Source {
    pub fn table(name: impl Into<String>) -> Self {
        Source::Table {
            name: name.into(),
            alias: None,
        }
    }

    pub fn subquery(query: QueryTree) -> Self {
        Source::SubQuery {
            query: Box::new(query),
            alias: None,
        }
    }

    pub fn alias(&self) -> Option<&TableAlias> {
        match self {
            Source::Table { alias, .. } | Source::SubQuery { alias, .. } => alias.as_ref(),
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        match self {
            Source::Table { name, .. } => Some(name),
            Source::SubQuery { .. } => None,
        }
    }

    pub(crate) fn is_aliased_by(&self, alias: &TableAlias) -> bool {
        self.alias()
            .is_some_and(|own| own.is_same_occurrence(alias))
    }

    /// The same source, known under `alias`.
    pub(crate) fn aliased(&self, alias: &TableAlias) -> Source {
        match self {
            Source::Table { name, .. } => Source::Table {
                name: name.clone(),
                alias: Some(alias.clone()),
            },
            Source::SubQuery { query, .. } => Source::SubQuery {
                query: query.clone(),
                alias: Some(alias.clone()),
            },
        }
    }

    /// Attaches `alias` to the source.
    ///
    /// When the source already has an alias, `alias` becomes a proxy of it.
    /// Sub-queries are qualified recursively, with their own fresh alias.
    pub fn qualified(&self, alias: &TableAlias) -> Result<Source> {
        match self {
            Source::Table {
                name,
                alias: Some(existing),
            } => {
                existing.bind(name)?;
                alias.become_proxy_of(existing)?;
                Ok(self.clone())
            }
            Source::Table { name, alias: None } => {
                alias.bind(name)?;
                Ok(Source::Table {
                    name: name.clone(),
                    alias: Some(alias.clone()),
                })
            }
            Source::SubQuery { query, alias: existing } => {
                let alias = match existing {
                    Some(existing) => {
                        alias.become_proxy_of(existing)?;
                        existing.clone()
                    }
                    None => alias.clone(),
                };
                Ok(Source::SubQuery {
                    query: Box::new(query.qualified()?),
                    alias: Some(alias),
                })
            }
        }
    }

    /// Merges two references to the same table occurrence.
    ///
    /// Only tables of the same name with compatible aliases merge.
    pub fn merged(&self, other: &Source) -> Option<Source> {
        let (
            Source::Table { name, alias },
            Source::Table {
                name: other_name,
                alias: other_alias,
            },
        ) = (self, other)
        else {
            return None;
        };
        if !name.eq_ignore_ascii_case(other_name) {
            return None;
        }
        let alias = match (alias, other_alias) {
            (Some(alias), Some(other_alias)) => Some(alias.merged(other_alias)?),
            (alias, other_alias) => alias.clone().or_else(|| other_alias.clone()),
        };
        Some(Source::Table {
            name: name.clone(),
            alias,
        })
    }

    /// Number of columns of `*` selected from this source.
    pub fn column_count(&self, db: &dyn SchemaSource) -> Result<usize> {
        match self {
            Source::Table { name, .. } => db.column_count(name),
            Source::SubQuery { query, .. } => query.selection_width(db),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify_table() {
        let alias = TableAlias::new();
        let source = Source::table("player").qualified(&alias).unwrap();
        assert!(source.is_aliased_by(&alias));
        assert_eq!(alias.table_name().as_deref(), Some("player"));
    }

    #[test]
    fn test_qualify_keeps_user_alias() {
        let user = TableAlias::named("p");
        let source = Source::table("player").aliased(&user);
        let fresh = TableAlias::new();
        source.qualified(&fresh).unwrap();
        assert!(fresh.is_same_occurrence(&user));
        assert_eq!(fresh.user_name().as_deref(), Some("p"));
        assert_eq!(user.table_name().as_deref(), Some("player"));
    }

    #[test]
    fn test_merge() {
        let a = Source::table("player");
        let b = Source::table("Player");
        assert!(a.merged(&b).is_some());
        assert!(a.merged(&Source::table("team")).is_none());

        let p = Source::table("player").aliased(&TableAlias::named("p"));
        let q = Source::table("player").aliased(&TableAlias::named("q"));
        assert!(p.merged(&q).is_none());
        assert!(p.merged(&a).is_some());

        let sub = Source::subquery(QueryTree::table("player"));
        assert!(sub.merged(&sub.clone()).is_none());
    }
}
