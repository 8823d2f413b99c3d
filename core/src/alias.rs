//! Table aliases: one identity per table (or sub-query) occurrence in a statement.
//!
//! Aliases form a union-find forest. An alias that turns out to denote the same
//! occurrence as another one becomes a proxy of it, and every read goes through
//! the root of its chain. Final SQL names are only decided once a whole
//! statement is known, see [`crate::generation`].

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{QueryError, Result};
use crate::expr::SqlExpr;
use crate::selection::Selection;

#[derive(Debug, Clone)]
enum AliasState {
    Undefined { user_name: Option<String> },
    Table { table_name: String, user_name: Option<String> },
    Proxy(TableAlias),
}

/// A mutable-identity token naming one occurrence of a table.
///
/// Cloning a `TableAlias` clones the handle, not the identity: both clones
/// refer to the same occurrence.
#[derive(Clone)]
pub struct TableAlias(Arc<Mutex<AliasState>>);

/// Stable identity of an alias root, usable as a map key during generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AliasKey(usize);

impl TableAlias {
    /// Creates a fresh, anonymous alias.
    pub fn new() -> Self {
        Self::with_state(AliasState::Undefined { user_name: None })
    }

    /// Creates a fresh alias that renders with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_state(AliasState::Undefined {
            user_name: Some(name.into()),
        })
    }

    fn with_state(state: AliasState) -> Self {
        TableAlias(Arc::new(Mutex::new(state)))
    }

    fn lock(&self) -> MutexGuard<'_, AliasState> {
        self.0.lock()
    }

    fn same(&self, other: &TableAlias) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Follows the proxy chain, compressing it on the way back.
    fn root(&self) -> TableAlias {
        let next = match &*self.lock() {
            AliasState::Proxy(next) => next.clone(),
            _ => return self.clone(),
        };
        let root = next.root();
        if !root.same(&next) {
            *self.lock() = AliasState::Proxy(root.clone());
        }
        root
    }

    pub(crate) fn key(&self) -> AliasKey {
        AliasKey(Arc::as_ptr(&self.root().0) as *const () as usize)
    }

    /// Returns true when both aliases denote the same occurrence.
    pub fn is_same_occurrence(&self, other: &TableAlias) -> bool {
        self.root().same(&other.root())
    }

    /// The table this alias is bound to, if any.
    pub fn table_name(&self) -> Option<String> {
        match &*self.root().lock() {
            AliasState::Table { table_name, .. } => Some(table_name.clone()),
            _ => None,
        }
    }

    /// The name given by the user, if any.
    pub fn user_name(&self) -> Option<String> {
        match &*self.root().lock() {
            AliasState::Undefined { user_name } | AliasState::Table { user_name, .. } => {
                user_name.clone()
            }
            AliasState::Proxy(_) => None,
        }
    }

    /// The name used to derive the final SQL alias.
    pub(crate) fn identity_name(&self) -> Option<String> {
        self.user_name().or_else(|| self.table_name())
    }

    /// Binds the alias to a table.
    ///
    /// Binding twice to the same table is a no-op; binding to another table fails.
    pub fn bind(&self, table_name: &str) -> Result<()> {
        let root = self.root();
        let mut state = root.lock();
        match &*state {
            AliasState::Undefined { user_name } => {
                *state = AliasState::Table {
                    table_name: table_name.to_owned(),
                    user_name: user_name.clone(),
                };
                Ok(())
            }
            AliasState::Table { table_name: bound, .. } if bound.eq_ignore_ascii_case(table_name) => {
                Ok(())
            }
            AliasState::Table { table_name: bound, .. } => Err(QueryError::AliasConflict {
                bound: bound.clone(),
                requested: table_name.to_owned(),
            }),
            AliasState::Proxy(_) => Ok(()),
        }
    }

    fn set_user_name(&self, name: &str) {
        let root = self.root();
        let mut state = root.lock();
        match &mut *state {
            AliasState::Undefined { user_name } | AliasState::Table { user_name, .. } => {
                *user_name = Some(name.to_owned());
            }
            AliasState::Proxy(_) => {}
        }
    }

    /// Makes `self` a transparent proxy of `base`.
    ///
    /// Fails when both are bound to different tables, or carry different user names.
    pub fn become_proxy_of(&self, base: &TableAlias) -> Result<()> {
        let root = self.root();
        let base_root = base.root();
        if root.same(&base_root) {
            return Ok(());
        }
        let (table_name, user_name) = match &*root.lock() {
            AliasState::Undefined { user_name } => (None, user_name.clone()),
            AliasState::Table {
                table_name,
                user_name,
            } => (Some(table_name.clone()), user_name.clone()),
            AliasState::Proxy(_) => (None, None),
        };
        if let (Some(name), Some(base_name)) = (&user_name, base_root.user_name())
            && *name != base_name
        {
            return Err(QueryError::AliasConflict {
                bound: base_name,
                requested: name.clone(),
            });
        }
        if let Some(table_name) = &table_name {
            base_root.bind(table_name)?;
        }
        if let Some(name) = &user_name {
            base_root.set_user_name(name);
        }
        *root.lock() = AliasState::Proxy(base_root);
        Ok(())
    }

    /// Returns an alias usable for both occurrences, or `None` when they can't be
    /// the same occurrence (different tables or different user names).
    pub fn merged(&self, other: &TableAlias) -> Option<TableAlias> {
        if self.is_same_occurrence(other) {
            return Some(self.clone());
        }
        if let (Some(table), Some(other_table)) = (self.table_name(), other.table_name())
            && !table.eq_ignore_ascii_case(&other_table)
        {
            return None;
        }
        other.become_proxy_of(self).ok()?;
        Some(self.clone())
    }

    /// A column of this occurrence.
    pub fn column(&self, name: impl Into<String>) -> SqlExpr {
        SqlExpr::Column {
            name: name.into(),
            qualifier: Some(self.clone()),
        }
    }

    /// All columns of this occurrence: `"alias".*`.
    pub fn all_columns(&self) -> Selection {
        Selection::AllColumns {
            qualifier: Some(self.clone()),
        }
    }
}

impl Default for TableAlias {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for TableAlias {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_occurrence(other)
    }
}

impl fmt::Debug for TableAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableAlias")
            .field("table", &self.table_name())
            .field("user_name", &self.user_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_is_idempotent_and_exclusive() {
        let alias = TableAlias::new();
        alias.bind("player").unwrap();
        alias.bind("player").unwrap();
        assert!(matches!(
            alias.bind("team"),
            Err(QueryError::AliasConflict { .. })
        ));
        assert_eq!(alias.table_name().as_deref(), Some("player"));
    }

    #[test]
    fn test_bind_from_other_threads() {
        let alias = TableAlias::new();
        let handles: Vec<_> = ["player", "team", "player", "team"]
            .into_iter()
            .map(|table| {
                let alias = alias.clone();
                std::thread::spawn(move || alias.bind(table).is_ok())
            })
            .collect();
        let bound: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Whichever table won, only binds to that same table succeeded.
        let table = alias.table_name().unwrap();
        assert_eq!(bound.iter().filter(|ok| **ok).count(), 2);
        assert!(table == "player" || table == "team");
    }

    #[test]
    fn test_proxy_forwards_reads() {
        let base = TableAlias::named("p");
        base.bind("player").unwrap();
        let proxy = TableAlias::new();
        proxy.become_proxy_of(&base).unwrap();
        assert_eq!(proxy.table_name().as_deref(), Some("player"));
        assert_eq!(proxy.user_name().as_deref(), Some("p"));
        assert!(proxy.is_same_occurrence(&base));
        assert_eq!(proxy.key(), base.key());
    }

    #[test]
    fn test_proxy_chain_resolves_to_root() {
        let a = TableAlias::new();
        let b = TableAlias::new();
        let c = TableAlias::new();
        a.become_proxy_of(&b).unwrap();
        b.become_proxy_of(&c).unwrap();
        c.bind("book").unwrap();
        assert_eq!(a.table_name().as_deref(), Some("book"));
        assert!(a.is_same_occurrence(&c));
    }

    #[test]
    fn test_proxy_of_other_table_fails() {
        let base = TableAlias::new();
        base.bind("player").unwrap();
        let other = TableAlias::new();
        other.bind("team").unwrap();
        assert!(other.become_proxy_of(&base).is_err());
        assert!(!other.is_same_occurrence(&base));
    }

    #[test]
    fn test_proxy_carries_user_name_to_base() {
        let base = TableAlias::new();
        base.bind("player").unwrap();
        let named = TableAlias::named("p");
        named.become_proxy_of(&base).unwrap();
        assert_eq!(base.user_name().as_deref(), Some("p"));
    }

    #[test]
    fn test_merge() {
        let a = TableAlias::new();
        a.bind("player").unwrap();
        let b = TableAlias::new();
        let merged = a.merged(&b).unwrap();
        assert!(merged.is_same_occurrence(&b));
        assert_eq!(b.table_name().as_deref(), Some("player"));

        let c = TableAlias::new();
        c.bind("team").unwrap();
        assert!(a.merged(&c).is_none());

        let d = TableAlias::named("x");
        let e = TableAlias::named("y");
        assert!(d.merged(&e).is_none());
    }
}
