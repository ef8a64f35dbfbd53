use crate::ecs::{Component, Entity};
use std::any::Any;
use std::collections::HashMap;

/// Storage for every instance of a single component type, keyed by entity.
///
/// Values never move between columns; an entity's composition is the set of
/// columns holding a value for it.
pub struct Column<T> {
    values: HashMap<Entity, T>,
}

impl<T> Column<T> {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    #[inline]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.values.get(&entity)
    }

    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.values.get_mut(&entity)
    }

    /// Store a value, returning the one it replaced.
    #[inline]
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        self.values.insert(entity, value)
    }

    #[inline]
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        self.values.remove(&entity)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a `Column<T>` used by the world for operations that do
/// not know the component type statically (despawn, bulk spawn).
pub trait ErasedColumn: Send + Sync {
    /// Insert a boxed value. Returns false if the box holds a different type.
    fn insert_boxed(&mut self, entity: Entity, value: Box<dyn Any + Send + Sync>) -> bool;

    /// Drop the entity's value if it has one.
    fn discard(&mut self, entity: Entity) -> bool;

    fn contains(&self, entity: Entity) -> bool;

    fn len(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedColumn for Column<T> {
    fn insert_boxed(&mut self, entity: Entity, value: Box<dyn Any + Send + Sync>) -> bool {
        match value.downcast::<T>() {
            Ok(value) => {
                self.values.insert(entity, *value);
                true
            }
            Err(_) => false,
        }
    }

    fn discard(&mut self, entity: Entity) -> bool {
        self.values.remove(&entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        self.values.contains_key(&entity)
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Column constructor stored in `ComponentMeta`.
pub(crate) fn new_column<T: Component>() -> Box<dyn ErasedColumn> {
    Box::new(Column::<T>::new())
}
