// component.rs - Runtime component registration
//
// Components are identified by dense u32 ids assigned in registration order.
// A type's identity is its Rust `TypeId`, never its shape, so two structs with
// identical fields are still two component types.

use crate::ecs::storage::{new_column, ErasedColumn};
use crate::ecs::RuntimeError;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Anything that can be stored on an entity.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// Dense per-runtime component id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u32);

impl ComponentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata describing a component type.
#[derive(Clone)]
pub struct ComponentMeta {
    pub type_id: TypeId,
    pub name: &'static str,
    pub(crate) new_column: fn() -> Box<dyn ErasedColumn>,
}

impl ComponentMeta {
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            new_column: new_column::<T>,
        }
    }
}

impl fmt::Debug for ComponentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMeta")
            .field("name", &self.name)
            .finish()
    }
}

/// Registry of the component types a runtime was configured with.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentId>,
    metas: Vec<ComponentMeta>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type. Registering the same type again returns the
    /// id it already has.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        self.register_meta(ComponentMeta::of::<T>())
    }

    pub(crate) fn register_meta(&mut self, meta: ComponentMeta) -> ComponentId {
        if let Some(&id) = self.by_type.get(&meta.type_id) {
            return id;
        }

        let id = ComponentId(self.metas.len() as u32);
        tracing::debug!(component = meta.name, %id, "registered component type");
        self.by_type.insert(meta.type_id, id);
        self.metas.push(meta);
        id
    }

    /// Look up the id of a registered component type.
    pub fn id_of<T: Component>(&self) -> Result<ComponentId, RuntimeError> {
        self.id_of_raw(TypeId::of::<T>(), type_name::<T>())
    }

    pub(crate) fn id_of_raw(
        &self,
        type_id: TypeId,
        name: &'static str,
    ) -> Result<ComponentId, RuntimeError> {
        self.by_type
            .get(&type_id)
            .copied()
            .ok_or(RuntimeError::UnknownComponent { name })
    }

    pub fn is_registered<T: Component>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn meta(&self, id: ComponentId) -> Option<&ComponentMeta> {
        self.metas.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &ComponentMeta)> {
        self.metas
            .iter()
            .enumerate()
            .map(|(idx, meta)| (ComponentId(idx as u32), meta))
    }
}
