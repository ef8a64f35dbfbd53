//! Entity handles
//!
//! Entities are lightweight handles (8 bytes) that reference component data
//! held by the `World`. Ids are handed out in increasing order starting at 1
//! and are never reused, so a despawned handle can never alias a live entity.

use std::fmt;

/// Opaque entity identifier.
///
/// Ordering follows creation order, which is also the iteration order of
/// query results.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(u64);

impl Entity {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id (for logging and save files).
    pub fn id(&self) -> u64 {
        self.0
    }

    /// Rebuild a handle from its raw id.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Hands out monotonically increasing entity ids.
#[derive(Debug)]
pub(crate) struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn alloc(&mut self) -> Entity {
        let entity = Entity::new(self.next);
        self.next += 1;
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert!(a < b);
        assert_eq!(Entity::from_raw(2), b);
        assert_eq!(b.to_string(), "Entity(2)");
    }
}
