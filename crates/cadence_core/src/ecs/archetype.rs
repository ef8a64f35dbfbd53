// archetype.rs - Entity signatures
//
// A signature is the set of component types an entity currently holds.
// Component ids are kept sorted so membership checks are binary searches and
// two entities with the same composition compare equal.

use crate::ecs::ComponentId;

/// The set of component types attached to one entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    components: Vec<ComponentId>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a signature from a list of component ids.
    ///
    /// The input will be sorted and deduplicated.
    pub fn from_components(mut comps: Vec<ComponentId>) -> Self {
        comps.sort_unstable();
        comps.dedup();
        Self { components: comps }
    }

    /// Check if this signature contains a specific component.
    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.components.binary_search(&id).is_ok()
    }

    pub fn contains_all(&self, ids: &[ComponentId]) -> bool {
        ids.iter().all(|&id| self.contains(id))
    }

    pub fn contains_any(&self, ids: &[ComponentId]) -> bool {
        ids.iter().any(|&id| self.contains(id))
    }

    /// Add a component id. Returns false if it was already present.
    pub fn insert(&mut self, id: ComponentId) -> bool {
        match self.components.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.components.insert(pos, id);
                true
            }
        }
    }

    /// Remove a component id. Returns false if it was absent.
    pub fn remove(&mut self, id: ComponentId) -> bool {
        match self.components.binary_search(&id) {
            Ok(pos) => {
                self.components.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
