//! A cube: one 16^3 slice of a column with its own storage and entities.

use parking_lot::{Mutex, RwLock};

use cubiq_core::coords::{CubePos, LocalPos};
use cubiq_core::error::{Error, Result};
use cubiq_core::types::{BlockId, OpacityTable};
use cubiq_voxel::{ArrayStorage, BlockStorage};

use crate::entity::{BlockEntityMap, Entity, EntityContainer};

/// Lifecycle state of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CubeState {
    /// Cube is being constructed and is not visible in its column yet.
    #[default]
    Primed,
    /// Cube is committed to its column and takes part in simulation.
    Loaded,
    /// Cube was evicted from its column.
    Unloaded,
}

/// A single cube of block data.
///
/// All accessors take `&self`; storage and entity sets sit behind their own
/// locks so render threads can read while the owning thread mutates.
pub struct Cube {
    pos: CubePos,
    state: Mutex<CubeState>,
    storage: RwLock<Option<ArrayStorage>>,
    entities: Mutex<EntityContainer>,
    block_entities: Mutex<BlockEntityMap>,
}

impl Cube {
    /// Create a new primed cube without storage.
    pub fn new(pos: CubePos) -> Self {
        Self {
            pos,
            state: Mutex::new(CubeState::Primed),
            storage: RwLock::new(None),
            entities: Mutex::new(EntityContainer::new()),
            block_entities: Mutex::new(BlockEntityMap::new()),
        }
    }

    /// Create a primed cube with existing storage.
    pub fn from_storage(pos: CubePos, storage: ArrayStorage) -> Self {
        let cube = Self::new(pos);
        *cube.storage.write() = Some(storage);
        cube
    }

    /// Position in cube coordinates.
    #[inline]
    pub fn pos(&self) -> CubePos {
        self.pos
    }

    /// Vertical index of this cube in its column.
    #[inline]
    pub fn y(&self) -> i32 {
        self.pos.y
    }

    pub fn state(&self) -> CubeState {
        *self.state.lock()
    }

    /// Returns true once committed and until evicted.
    pub fn is_loaded(&self) -> bool {
        self.state() == CubeState::Loaded
    }

    pub(crate) fn mark_loaded(&self) {
        *self.state.lock() = CubeState::Loaded;
    }

    pub(crate) fn mark_unloaded(&self) {
        *self.state.lock() = CubeState::Unloaded;
    }

    /// Returns true if storage has been installed.
    pub fn has_storage(&self) -> bool {
        self.storage.read().is_some()
    }

    /// Returns true if there is no storage or it holds only air.
    pub fn is_empty(&self) -> bool {
        self.storage.read().as_ref().map_or(true, BlockStorage::is_empty)
    }

    /// Number of non-air blocks.
    pub fn non_air_count(&self) -> usize {
        self.storage
            .read()
            .as_ref()
            .map_or(0, BlockStorage::non_air_count)
    }

    /// Execute a function with read access to the storage, if any.
    pub fn with_storage<F, R>(&self, f: F) -> R
    where
        F: FnOnce(Option<&ArrayStorage>) -> R,
    {
        f(self.storage.read().as_ref())
    }

    /// Execute a function with write access to existing storage.
    ///
    /// Returns `None` if the cube has no storage.
    pub fn with_storage_mut<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut ArrayStorage) -> R,
    {
        self.storage.write().as_mut().map(f)
    }

    /// Execute a function with write access to the storage, creating an
    /// all-air storage first if the cube has none.
    pub fn with_storage_or_create<F, R>(&self, has_sky: bool, f: F) -> R
    where
        F: FnOnce(&mut ArrayStorage) -> R,
    {
        let mut storage = self.storage.write();
        let min_y = self.pos.min_block().y;
        f(storage.get_or_insert_with(|| ArrayStorage::new(min_y, has_sky)))
    }

    /// Install block storage into this cube.
    ///
    /// Storage holding any non-air block can only be mutated in place;
    /// replacing it fails with [`Error::AlreadyPopulated`].
    pub fn set_storage(&self, storage: ArrayStorage) -> Result<()> {
        let mut slot = self.storage.write();
        if slot.as_ref().is_some_and(|existing| !existing.is_empty()) {
            return Err(Error::AlreadyPopulated { pos: self.pos });
        }
        debug_assert_eq!(storage.base_y(), self.pos.min_block().y);
        *slot = Some(storage);
        Ok(())
    }

    /// Swap the storage unconditionally. Only fixed-array columns do this.
    pub(crate) fn replace_storage(&self, storage: Option<ArrayStorage>) -> Option<ArrayStorage> {
        std::mem::replace(&mut *self.storage.write(), storage)
    }

    /// Block at a local position; air if there is no storage.
    pub fn block(&self, pos: LocalPos) -> BlockId {
        self.storage
            .read()
            .as_ref()
            .map_or(BlockId::AIR, |storage| storage.get(pos))
    }

    /// All blocks with non-zero light opacity and their opacity.
    pub fn opaque_blocks(&self, table: &OpacityTable) -> Vec<(LocalPos, u8)> {
        self.storage.read().as_ref().map_or_else(Vec::new, |storage| {
            storage
                .solid_blocks()
                .map(|(pos, block)| (pos, table.opacity(block)))
                .filter(|(_, opacity)| *opacity > 0)
                .collect()
        })
    }

    /// Execute a function with read access to the entity set.
    pub fn with_entities<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&EntityContainer) -> R,
    {
        f(&*self.entities.lock())
    }

    /// Execute a function with write access to the entity set.
    pub fn with_entities_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut EntityContainer) -> R,
    {
        f(&mut *self.entities.lock())
    }

    /// Attach a block entity, returning the one it replaced.
    pub fn insert_block_entity(&self, pos: LocalPos, entity: Entity) -> Option<Entity> {
        self.block_entities.lock().insert(pos, entity)
    }

    pub fn block_entity(&self, pos: LocalPos) -> Option<Entity> {
        self.block_entities.lock().get(&pos).copied()
    }

    pub fn remove_block_entity(&self, pos: LocalPos) -> Option<Entity> {
        self.block_entities.lock().remove(&pos)
    }

    pub fn block_entity_count(&self) -> usize {
        self.block_entities.lock().len()
    }
}

impl std::fmt::Debug for Cube {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cube")
            .field("pos", &self.pos)
            .field("state", &self.state())
            .field("has_storage", &self.has_storage())
            .field("non_air", &self.non_air_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated(pos: CubePos) -> ArrayStorage {
        let mut storage = ArrayStorage::new(pos.min_block().y, true);
        storage.set(LocalPos::new(0, 0, 0), BlockId::STONE);
        storage
    }

    #[test]
    fn new_cube_is_primed_without_storage() {
        let cube = Cube::new(CubePos::new(0, 3, 0));
        assert_eq!(cube.state(), CubeState::Primed);
        assert!(!cube.is_loaded());
        assert!(!cube.has_storage());
        assert!(cube.is_empty());
        assert!(cube.with_storage(|storage| storage.is_none()));
    }

    #[test]
    fn set_storage_on_absent_storage_is_visible() {
        let pos = CubePos::new(1, -2, 3);
        let cube = Cube::new(pos);
        cube.set_storage(populated(pos)).unwrap();

        assert!(cube.has_storage());
        assert_eq!(cube.block(LocalPos::new(0, 0, 0)), BlockId::STONE);
        assert_eq!(cube.non_air_count(), 1);
    }

    #[test]
    fn set_storage_over_populated_storage_fails() {
        let pos = CubePos::new(0, 5, 0);
        let cube = Cube::from_storage(pos, populated(pos));

        let err = cube.set_storage(populated(pos)).unwrap_err();
        assert_eq!(err, Error::AlreadyPopulated { pos });
        // The original storage is untouched.
        assert_eq!(cube.non_air_count(), 1);
    }

    #[test]
    fn set_storage_over_empty_storage_succeeds() {
        let pos = CubePos::new(0, 0, 0);
        let cube = Cube::from_storage(pos, ArrayStorage::new(0, true));
        cube.set_storage(populated(pos)).unwrap();
        assert_eq!(cube.non_air_count(), 1);
    }

    #[test]
    fn storage_or_create_uses_cube_base() {
        let cube = Cube::new(CubePos::new(0, -1, 0));
        let base = cube.with_storage_or_create(false, |storage| storage.base_y());
        assert_eq!(base, -16);
        assert!(cube.has_storage());
        assert_eq!(cube.with_storage_mut(|storage| storage.has_sky()), Some(false));
    }

    #[test]
    fn opaque_blocks_skip_transparent() {
        let pos = CubePos::new(0, 0, 0);
        let mut storage = ArrayStorage::new(0, true);
        storage.set(LocalPos::new(1, 2, 3), BlockId::STONE);
        storage.set(LocalPos::new(4, 5, 6), BlockId::GLASS);
        let cube = Cube::from_storage(pos, storage);

        let opaque = cube.opaque_blocks(&OpacityTable::default());
        assert_eq!(opaque, vec![(LocalPos::new(1, 2, 3), 15)]);
    }

    #[test]
    fn block_entities_by_local_pos() {
        let mut world = hecs::World::new();
        let chest = world.spawn(());
        let cube = Cube::new(CubePos::new(0, 0, 0));
        let pos = LocalPos::new(7, 7, 7);

        assert_eq!(cube.insert_block_entity(pos, chest), None);
        assert_eq!(cube.block_entity(pos), Some(chest));
        assert_eq!(cube.block_entity_count(), 1);
        assert_eq!(cube.remove_block_entity(pos), Some(chest));
        assert_eq!(cube.block_entity(pos), None);
    }
}
