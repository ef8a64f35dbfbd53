//! Query descriptors, the result cache and typed fetches.
//!
//! A [`Query`] is a normalized, order-insensitive description of what a system
//! wants to see: the items it reads and the presence filters entities must
//! pass. Structurally equal queries share one cached result set, which the
//! world keeps up to date as entities change.

mod cache;
mod fetch;

pub use cache::{CachedQuery, QueryCache, QueryId};
pub use fetch::{QueryData, QueryIter, QueryResults};

use crate::ecs::Component;
use std::any::{type_name, TypeId};
use std::collections::BTreeSet;
use std::fmt;

/// A component type named by a query, before it is resolved against the
/// registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentKey {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentKey {
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One requested item kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryItem {
    /// The entity handle itself.
    Entity,
    /// A component the entity must have.
    Component(ComponentKey),
    /// A component read when present; does not affect membership.
    Maybe(ComponentKey),
}

/// Membership filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum QueryFilter {
    With(ComponentKey),
    Without(ComponentKey),
}

/// Immutable, normalized query descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Query {
    items: BTreeSet<QueryItem>,
    filters: BTreeSet<QueryFilter>,
}

impl Query {
    /// An empty query; matches every entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// The query a typed fetch needs.
    pub fn of<D: QueryData>() -> Self {
        let mut query = Self::new();
        D::describe(&mut query);
        query
    }

    /// Require and read component `T`.
    pub fn read<T: Component>(mut self) -> Self {
        self.items.insert(QueryItem::Component(ComponentKey::of::<T>()));
        self
    }

    /// Request the entity handle.
    pub fn entity(mut self) -> Self {
        self.items.insert(QueryItem::Entity);
        self
    }

    /// Only match entities that have `T`.
    pub fn with<T: Component>(mut self) -> Self {
        self.filters.insert(QueryFilter::With(ComponentKey::of::<T>()));
        self
    }

    /// Only match entities that lack `T`.
    pub fn without<T: Component>(mut self) -> Self {
        self.filters.insert(QueryFilter::Without(ComponentKey::of::<T>()));
        self
    }

    /// Add the items of a typed fetch to this query.
    pub fn including<D: QueryData>(mut self) -> Self {
        D::describe(&mut self);
        self
    }

    pub(crate) fn push_item(&mut self, item: QueryItem) {
        self.items.insert(item);
    }

    /// Structural equality; independent of the order things were declared in.
    pub fn matches(&self, other: &Query) -> bool {
        self == other
    }

    pub fn items(&self) -> impl Iterator<Item = &QueryItem> {
        self.items.iter()
    }

    pub fn filters(&self) -> impl Iterator<Item = &QueryFilter> {
        self.filters.iter()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| {
            let out = if first { Ok(()) } else { write!(f, ", ") };
            first = false;
            out
        };

        for item in &self.items {
            sep(f)?;
            match item {
                QueryItem::Entity => write!(f, "Entity")?,
                QueryItem::Component(key) => write!(f, "{}", key.name)?,
                QueryItem::Maybe(key) => write!(f, "Option<{}>", key.name)?,
            }
        }
        for filter in &self.filters {
            sep(f)?;
            match filter {
                QueryFilter::With(key) => write!(f, "With<{}>", key.name)?,
                QueryFilter::Without(key) => write!(f, "Without<{}>", key.name)?,
            }
        }
        Ok(())
    }
}
