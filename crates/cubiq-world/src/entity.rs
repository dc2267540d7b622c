//! Entity bookkeeping local to a cube.
//!
//! Entities themselves live in the host's ECS; cubes only remember which
//! handles are inside them.

use hashbrown::{HashMap, HashSet};
pub use hecs::Entity;

use cubiq_core::coords::LocalPos;

/// Set of entities whose position lies inside one cube.
#[derive(Clone, Debug, Default)]
pub struct EntityContainer {
    entities: HashSet<Entity>,
}

impl EntityContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. Returns false if it was already present.
    pub fn insert(&mut self, entity: Entity) -> bool {
        self.entities.insert(entity)
    }

    /// Remove an entity. Returns false if it was not present.
    pub fn remove(&mut self, entity: Entity) -> bool {
        self.entities.remove(&entity)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Block entities of one cube keyed by their local position.
pub type BlockEntityMap = HashMap<LocalPos, Entity>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut world = hecs::World::new();
        let a = world.spawn(());
        let b = world.spawn(());

        let mut container = EntityContainer::new();
        assert!(container.insert(a));
        assert!(!container.insert(a));
        assert!(container.insert(b));
        assert_eq!(container.len(), 2);

        assert!(container.remove(a));
        assert!(!container.remove(a));
        assert!(!container.contains(a));
        assert_eq!(container.iter().collect::<Vec<_>>(), vec![b]);
    }
}
