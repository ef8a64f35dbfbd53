//! Typed access to cached query results.

use super::{CachedQuery, ComponentKey, Query, QueryId, QueryItem};
use crate::ecs::{Component, Entity, RuntimeError, World};
use std::collections::btree_set;
use std::marker::PhantomData;

/// Something a query can hand back per matching entity.
///
/// Implemented for `Entity`, `&T`, `Option<&T>` and tuples of up to eight
/// fetches.
pub trait QueryData {
    type Item<'w>;

    /// Add the items this fetch needs to `query`.
    fn describe(query: &mut Query);

    /// Read the item for `entity`. `None` means the entity does not carry
    /// what this fetch requires.
    fn fetch<'w>(world: &'w World, entity: Entity) -> Option<Self::Item<'w>>;
}

impl QueryData for Entity {
    type Item<'w> = Entity;

    fn describe(query: &mut Query) {
        query.push_item(QueryItem::Entity);
    }

    fn fetch<'w>(_world: &'w World, entity: Entity) -> Option<Self::Item<'w>> {
        Some(entity)
    }
}

impl<'a, T: Component> QueryData for &'a T {
    type Item<'w> = &'w T;

    fn describe(query: &mut Query) {
        query.push_item(QueryItem::Component(ComponentKey::of::<T>()));
    }

    fn fetch<'w>(world: &'w World, entity: Entity) -> Option<Self::Item<'w>> {
        world.try_get::<T>(entity)
    }
}

impl<'a, T: Component> QueryData for Option<&'a T> {
    type Item<'w> = Option<&'w T>;

    fn describe(query: &mut Query) {
        query.push_item(QueryItem::Maybe(ComponentKey::of::<T>()));
    }

    fn fetch<'w>(world: &'w World, entity: Entity) -> Option<Self::Item<'w>> {
        Some(world.try_get::<T>(entity))
    }
}

macro_rules! impl_query_data {
    ($($name:ident),+) => {
        impl<$($name: QueryData),+> QueryData for ($($name,)+) {
            type Item<'w> = ($($name::Item<'w>,)+);

            fn describe(query: &mut Query) {
                $($name::describe(query);)+
            }

            fn fetch<'w>(world: &'w World, entity: Entity) -> Option<Self::Item<'w>> {
                Some(($($name::fetch(world, entity)?,)+))
            }
        }
    };
}

impl_query_data!(A);
impl_query_data!(A, B);
impl_query_data!(A, B, C);
impl_query_data!(A, B, C, D);
impl_query_data!(A, B, C, D, E);
impl_query_data!(A, B, C, D, E, F);
impl_query_data!(A, B, C, D, E, F, G);
impl_query_data!(A, B, C, D, E, F, G, H);

/// Live view over one cached result slot.
///
/// The view borrows the world, so the entity set and every value it yields
/// are read from current storage; it cannot outlive the next mutation.
pub struct QueryResults<'w, D: QueryData> {
    id: QueryId,
    cached: &'w CachedQuery,
    world: &'w World,
    marker: PhantomData<fn() -> D>,
}

impl<'w, D: QueryData> QueryResults<'w, D> {
    pub(crate) fn new(id: QueryId, cached: &'w CachedQuery, world: &'w World) -> Self {
        Self {
            id,
            cached,
            world,
            marker: PhantomData,
        }
    }

    /// The cached slot backing this view.
    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn query(&self) -> &'w Query {
        self.cached.query()
    }

    pub fn len(&self) -> usize {
        self.cached.matches().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cached.matches().is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.cached.matches().contains(&entity)
    }

    /// Matching entities, in creation order.
    pub fn entities(&self) -> Vec<Entity> {
        self.cached.matches().iter().copied().collect()
    }

    pub fn iter(&self) -> QueryIter<'w, D> {
        QueryIter {
            entities: self.cached.matches().iter(),
            world: self.world,
            marker: PhantomData,
        }
    }

    /// The only result; fails when there are none or several.
    pub fn single(&self) -> Result<D::Item<'w>, RuntimeError> {
        let count = self.len();
        if count > 1 {
            return Err(RuntimeError::MultipleResults {
                query: self.cached.query().clone(),
                count,
            });
        }
        self.iter().next().ok_or_else(|| RuntimeError::NoResults {
            query: self.cached.query().clone(),
        })
    }
}

impl<'w, D: QueryData> IntoIterator for QueryResults<'w, D> {
    type Item = D::Item<'w>;
    type IntoIter = QueryIter<'w, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'q, 'w, D: QueryData> IntoIterator for &'q QueryResults<'w, D> {
    type Item = D::Item<'w>;
    type IntoIter = QueryIter<'w, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the items of a [`QueryResults`].
pub struct QueryIter<'w, D: QueryData> {
    entities: btree_set::Iter<'w, Entity>,
    world: &'w World,
    marker: PhantomData<fn() -> D>,
}

impl<'w, D: QueryData> Iterator for QueryIter<'w, D> {
    type Item = D::Item<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        for &entity in self.entities.by_ref() {
            if let Some(item) = D::fetch(self.world, entity) {
                return Some(item);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.entities.size_hint().1)
    }
}
