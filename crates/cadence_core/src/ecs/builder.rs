use crate::ecs::Component;
use std::any::{type_name, Any, TypeId};
use std::fmt;

/// Owned, type-erased component value waiting to be attached to an entity.
pub(crate) struct PendingComponent {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) value: Box<dyn Any + Send + Sync>,
}

impl PendingComponent {
    fn new<T: Component>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            value: Box::new(value),
        }
    }
}

impl fmt::Debug for PendingComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PendingComponent").field(&self.name).finish()
    }
}

/// Builder for the component set of an entity prior to spawning.
///
/// Adding the same component type twice keeps the last value.
#[derive(Debug, Default)]
pub struct EntityBuilder {
    components: Vec<PendingComponent>,
}

impl EntityBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Add a component by value.
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.push(PendingComponent::new(value));
        self
    }

    fn push(&mut self, component: PendingComponent) {
        match self
            .components
            .iter_mut()
            .find(|existing| existing.type_id == component.type_id)
        {
            Some(existing) => *existing = component,
            None => self.components.push(component),
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn components(&self) -> &[PendingComponent] {
        &self.components
    }

    pub(crate) fn into_components(self) -> Vec<PendingComponent> {
        self.components
    }
}
