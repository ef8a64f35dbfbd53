// world.rs - Entity registry and component storage

use crate::ecs::entity::EntityAllocator;
use crate::ecs::storage::new_column;
use crate::ecs::{
    Column, Component, ComponentId, ComponentRegistry, Entity, EntityBuilder, ErasedColumn,
    Query, QueryCache, QueryData, QueryId, QueryResults, RuntimeError, Signature,
};
use std::collections::BTreeMap;

/// Bookkeeping for one live entity.
#[derive(Debug, Default)]
struct EntityRecord {
    signature: Signature,
    parent: Option<Entity>,
    children: Vec<Entity>,
}

/// Owns every entity, every component value and the cached query results
/// built over them.
///
/// All mutating operations validate their inputs first and only then touch
/// storage, so a failing call leaves the world exactly as it was.
pub struct World {
    components: ComponentRegistry,
    columns: Vec<Box<dyn ErasedColumn>>,
    entities: BTreeMap<Entity, EntityRecord>,
    allocator: EntityAllocator,
    queries: QueryCache,
}

impl World {
    /// Create an empty world over an already populated registry.
    pub fn new(components: ComponentRegistry) -> Self {
        let columns = components
            .iter()
            .map(|(_, meta)| (meta.new_column)())
            .collect();

        Self {
            components,
            columns,
            entities: BTreeMap::new(),
            allocator: EntityAllocator::new(),
            queries: QueryCache::new(),
        }
    }

    /// Register a component type after construction. Idempotent.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        let id = self.components.register::<T>();
        if id.index() == self.columns.len() {
            self.columns.push(new_column::<T>());
        }
        id
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Spawn an entity from a builder.
    pub fn spawn(&mut self, builder: EntityBuilder) -> Result<Entity, RuntimeError> {
        self.create(builder, None)
    }

    /// Spawn an entity as a child of `parent`.
    pub fn spawn_child(
        &mut self,
        parent: Entity,
        builder: EntityBuilder,
    ) -> Result<Entity, RuntimeError> {
        self.create(builder, Some(parent))
    }

    fn create(
        &mut self,
        builder: EntityBuilder,
        parent: Option<Entity>,
    ) -> Result<Entity, RuntimeError> {
        if let Some(parent) = parent {
            self.ensure_alive(parent)?;
        }
        let ids = builder
            .components()
            .iter()
            .map(|pending| self.components.id_of_raw(pending.type_id, pending.name))
            .collect::<Result<Vec<_>, _>>()?;

        let entity = self.allocator.alloc();
        for (id, pending) in ids.iter().zip(builder.into_components()) {
            let stored = self.columns[id.index()].insert_boxed(entity, pending.value);
            debug_assert!(stored, "column type mismatch for {}", pending.name);
        }

        let signature = Signature::from_components(ids);
        self.queries.on_spawn(entity, &signature);
        self.entities.insert(
            entity,
            EntityRecord {
                signature,
                parent,
                children: Vec::new(),
            },
        );
        if let Some(parent) = parent {
            if let Some(record) = self.entities.get_mut(&parent) {
                record.children.push(entity);
            }
        }

        tracing::trace!(%entity, ?parent, "spawned entity");
        Ok(entity)
    }

    /// Despawn an entity together with all of its descendants.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), RuntimeError> {
        let parent = self.ensure_alive(entity)?.parent;

        if let Some(parent) = parent {
            if let Some(record) = self.entities.get_mut(&parent) {
                record.children.retain(|&child| child != entity);
            }
        }

        let mut pending = vec![entity];
        while let Some(next) = pending.pop() {
            let Some(record) = self.entities.remove(&next) else {
                continue;
            };
            for &id in record.signature.components() {
                self.columns[id.index()].discard(next);
            }
            self.queries.on_despawn(next);
            pending.extend(record.children);
            tracing::trace!(entity = %next, "despawned entity");
        }
        Ok(())
    }

    /// Attach a component, replacing (and dropping) any previous value.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), RuntimeError> {
        let id = self.components.id_of::<T>()?;
        self.ensure_alive(entity)?;

        self.column_mut_by_id::<T>(id).insert(entity, value);

        if let Some(record) = self.entities.get_mut(&entity) {
            if record.signature.insert(id) {
                self.queries.on_change(entity, &record.signature, id);
            }
        }
        Ok(())
    }

    /// Detach a component, handing back its value if the entity had one.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<Option<T>, RuntimeError> {
        let id = self.components.id_of::<T>()?;
        self.ensure_alive(entity)?;

        let removed = self.column_mut_by_id::<T>(id).remove(entity);

        if let Some(record) = self.entities.get_mut(&entity) {
            if record.signature.remove(id) {
                self.queries.on_change(entity, &record.signature, id);
            }
        }
        Ok(removed)
    }

    /// Read a component; `Ok(None)` when the entity lacks it.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<Option<&T>, RuntimeError> {
        let id = self.components.id_of::<T>()?;
        self.ensure_alive(entity)?;
        Ok(self.column_by_id::<T>(id).get(entity))
    }

    /// Mutably borrow a component; `Ok(None)` when the entity lacks it.
    pub fn get_mut<T: Component>(
        &mut self,
        entity: Entity,
    ) -> Result<Option<&mut T>, RuntimeError> {
        let id = self.components.id_of::<T>()?;
        self.ensure_alive(entity)?;
        Ok(self.column_mut_by_id::<T>(id).get_mut(entity))
    }

    /// Lenient read used by query fetches.
    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.components.id_of::<T>().ok()?;
        self.column_by_id::<T>(id).get(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        match (self.components.id_of::<T>(), self.entities.get(&entity)) {
            (Ok(id), Some(record)) => record.signature.contains(id),
            _ => false,
        }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn signature(&self, entity: Entity) -> Result<&Signature, RuntimeError> {
        Ok(&self.ensure_alive(entity)?.signature)
    }

    pub fn parent(&self, entity: Entity) -> Result<Option<Entity>, RuntimeError> {
        Ok(self.ensure_alive(entity)?.parent)
    }

    pub fn children(&self, entity: Entity) -> Result<&[Entity], RuntimeError> {
        Ok(&self.ensure_alive(entity)?.children)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().copied()
    }

    /// Typed view over the entities matching `D`.
    pub fn query<D: QueryData>(&mut self) -> Result<QueryResults<'_, D>, RuntimeError> {
        self.query_by::<D>(&Query::new())
    }

    /// Typed view over the entities matching `query` extended with the items
    /// `D` reads.
    pub fn query_by<D: QueryData>(
        &mut self,
        query: &Query,
    ) -> Result<QueryResults<'_, D>, RuntimeError> {
        let id = self.resolve(&query.clone().including::<D>())?;
        self.results(id)
    }

    /// Cached slot for `query`, created on first use.
    pub fn resolve(&mut self, query: &Query) -> Result<QueryId, RuntimeError> {
        let entities = self
            .entities
            .iter()
            .map(|(&entity, record)| (entity, &record.signature));
        self.queries.resolve(query, &self.components, entities)
    }

    fn results<D: QueryData>(&self, id: QueryId) -> Result<QueryResults<'_, D>, RuntimeError> {
        let cached = self.queries.get(id).ok_or_else(|| RuntimeError::NoResults {
            query: Query::of::<D>(),
        })?;
        Ok(QueryResults::new(id, cached, self))
    }

    /// Run `f` on component `T` of every entity matching `query` (which is
    /// extended to require `T`).
    pub fn each_mut<T: Component>(
        &mut self,
        query: &Query,
        mut f: impl FnMut(Entity, &mut T),
    ) -> Result<(), RuntimeError> {
        let query_id = self.resolve(&query.clone().read::<T>())?;
        let component = self.components.id_of::<T>()?;

        let Self {
            columns, queries, ..
        } = self;
        let Some(cached) = queries.get(query_id) else {
            return Ok(());
        };
        let Some(column) = columns[component.index()]
            .as_any_mut()
            .downcast_mut::<Column<T>>()
        else {
            return Ok(());
        };

        for &entity in cached.matches() {
            if let Some(value) = column.get_mut(entity) {
                f(entity, value);
            }
        }
        Ok(())
    }

    pub fn queries(&self) -> &QueryCache {
        &self.queries
    }

    fn ensure_alive(&self, entity: Entity) -> Result<&EntityRecord, RuntimeError> {
        self.entities
            .get(&entity)
            .ok_or(RuntimeError::InvalidEntity { entity })
    }

    fn column_by_id<T: Component>(&self, id: ComponentId) -> &Column<T> {
        self.columns[id.index()]
            .as_any()
            .downcast_ref::<Column<T>>()
            .expect("column type matches its registration")
    }

    fn column_mut_by_id<T: Component>(&mut self, id: ComponentId) -> &mut Column<T> {
        self.columns[id.index()]
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .expect("column type matches its registration")
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(ComponentRegistry::new())
    }
}
