//! Host-facing column operations on top of a storage provider.
//!
//! A [`Column`] combines a [`StorageProvider`] with the column's height map.
//! Block writes go through the column so the height map sees every opacity
//! change; the raw redirect accessors ([`Column::with_storage_mut`],
//! [`Column::set_storage`]) exist for loaders and bypass notification.

use std::ops::Range;
use std::sync::Arc;

use glam::DVec3;
use parking_lot::RwLock;

use cubiq_core::config::WorldConfig;
use cubiq_core::constants::{MAX_LIGHT, NO_HEIGHT};
use cubiq_core::coords::{
    block_to_cube, cube_to_max_block, cube_to_min_block, BlockPos, ColumnPos, CubePos, LocalPos,
};
use cubiq_core::error::{Error, Result};
use cubiq_core::math::Aabb;
use cubiq_core::types::{BlockId, OpacityTable};
use cubiq_voxel::{ArrayStorage, BlockStorage, LightLayer};

use crate::cube::Cube;
use crate::cube_map::{CubeMap, PrimedCube};
use crate::entity::{Entity, EntityContainer};
use crate::height_map::{new_height_map, HeightMap, HeightMapKind};
use crate::provider::{CubeStorage, NativeStorage, ProviderProbe, StorageProvider};

/// Blocks an entity may extend past the cube it is stored in.
const ENTITY_REACH: f64 = 2.0;

/// A column of the world backed by a storage provider.
pub struct Column<P: StorageProvider> {
    pos: ColumnPos,
    provider: P,
    height_map: RwLock<Box<dyn HeightMap>>,
    config: Arc<WorldConfig>,
    opacity: Arc<OpacityTable>,
}

/// Legacy column of sixteen fixed sections.
pub type LegacyColumn = Column<NativeStorage>;

/// Column virtualized into a sparse stack of cubes.
pub type CubicColumn = Column<CubeStorage>;

impl<P: StorageProvider> Column<P> {
    /// Wrap a provider; the height map variant follows the configured authority.
    pub fn with_provider(provider: P, config: Arc<WorldConfig>, opacity: Arc<OpacityTable>) -> Self {
        let kind = HeightMapKind::from(config.authority);
        Self {
            pos: provider.column(),
            provider,
            height_map: RwLock::new(new_height_map(kind)),
            config,
            opacity,
        }
    }

    pub fn pos(&self) -> ColumnPos {
        self.pos
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn height_map_kind(&self) -> HeightMapKind {
        self.height_map.read().kind()
    }

    fn clamp_index(&self, index: i32) -> i32 {
        let bounds = self.provider.bounds();
        index.clamp(bounds.start, bounds.end - 1)
    }

    /// Split a block position owned by this column.
    fn split(&self, pos: BlockPos) -> Result<(CubePos, LocalPos)> {
        let actual = pos.column_pos();
        if actual != self.pos {
            return Err(Error::BlockOutsideColumn {
                expected: self.pos,
                actual,
            });
        }
        Ok(pos.split())
    }

    fn missing(&self, index: i32) -> Error {
        Error::MissingUnit {
            pos: self.pos.cube(index),
        }
    }

    // Block access

    /// Block at a position. Absent cubes read as air and are not created.
    pub fn block(&self, pos: BlockPos) -> Result<BlockId> {
        let (cube, local) = self.split(pos)?;
        Ok(self
            .provider
            .unit(cube.y)?
            .map_or(BlockId::AIR, |section| section.block(local)))
    }

    /// Write a block and return the one it replaced.
    ///
    /// The height map write lock is held across the store and the opacity
    /// notification, so notifications for a slot arrive in write order.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn set_block(&self, pos: BlockPos, block: BlockId) -> Result<BlockId> {
        let (cube, local) = self.split(pos)?;
        let mut heights = self.height_map.write();

        let section = match self.provider.unit(cube.y)? {
            Some(section) => section,
            None if block.is_air() => return Ok(BlockId::AIR),
            None => self.provider.unit_or_create(cube.y)?,
        };
        if block.is_air() && !section.has_storage() {
            return Ok(BlockId::AIR);
        }
        let previous =
            section.with_storage_or_create(self.config.has_sky, |storage| storage.set(local, block));

        let opacity = self.opacity.opacity(block);
        if opacity != self.opacity.opacity(previous) {
            let probe = ProviderProbe::new(&self.provider, &self.opacity);
            heights.on_opacity_change(
                usize::from(local.x),
                pos.y,
                usize::from(local.z),
                opacity,
                &probe,
            );
        }
        Ok(previous)
    }

    /// Light level at a position.
    ///
    /// Without storage the sky channel is fully lit at or above the surface
    /// and dark below it; the block channel is dark.
    pub fn light(&self, layer: LightLayer, pos: BlockPos) -> Result<u8> {
        let (cube, local) = self.split(pos)?;
        let stored = self.provider.unit(cube.y)?.and_then(|section| {
            section.with_storage(|storage| storage.map(|storage| storage.light(layer, local)))
        });
        Ok(stored.unwrap_or_else(|| match layer {
            LightLayer::Sky if self.config.has_sky => {
                let height = self.height_value(usize::from(local.x), usize::from(local.z));
                if pos.y >= height {
                    MAX_LIGHT
                } else {
                    0
                }
            }
            _ => 0,
        }))
    }

    /// Set a light level, creating storage if needed.
    pub fn set_light(&self, layer: LightLayer, pos: BlockPos, level: u8) -> Result<()> {
        let (cube, local) = self.split(pos)?;
        self.provider
            .unit_or_create(cube.y)?
            .with_storage_or_create(self.config.has_sky, |storage| {
                storage.set_light(layer, local, level);
            });
        Ok(())
    }

    // Heights

    /// Y of the highest opaque block of a slot, or [`NO_HEIGHT`].
    pub fn top_block_y(&self, local_x: usize, local_z: usize) -> i32 {
        self.height_map.read().top_block_y(local_x, local_z)
    }

    /// First Y above the highest opaque block, or [`NO_HEIGHT`].
    pub fn height_value(&self, local_x: usize, local_z: usize) -> i32 {
        match self.top_block_y(local_x, local_z) {
            NO_HEIGHT => NO_HEIGHT,
            top => top + 1,
        }
    }

    /// Y where precipitation lands; the average ground level if unknown.
    pub fn precipitation_height(&self, local_x: usize, local_z: usize) -> i32 {
        match self.top_block_y(local_x, local_z) {
            NO_HEIGHT => self.config.average_ground_level,
            top => top + 1,
        }
    }

    /// Y of the highest opaque block strictly below `y`.
    ///
    /// `None` unless the height map keeps full opacity data.
    pub fn top_block_y_below(&self, local_x: usize, local_z: usize, y: i32) -> Option<i32> {
        self.height_map.read().top_block_y_below(local_x, local_z, y)
    }

    /// Sum of the opacities above `y` in a slot, dimming sky light at `y`.
    ///
    /// `None` unless the height map keeps full opacity data.
    pub fn opacity_above(&self, local_x: usize, y: i32, local_z: usize) -> Option<u64> {
        self.height_map.read().opacity_above(local_x, y, local_z)
    }

    pub fn highest_top_block_y(&self) -> i32 {
        self.height_map.read().highest_top_block_y()
    }

    /// Lowest block Y of the cube holding the highest opaque block.
    pub fn top_filled_segment(&self) -> i32 {
        let top = match self.highest_top_block_y() {
            NO_HEIGHT => self.config.average_ground_level,
            top => top,
        };
        cube_to_min_block(self.clamp_index(block_to_cube(top)))
    }

    /// Returns true if every section overlapping `start_y..=end_y` is empty.
    ///
    /// The range is clamped to the column bounds.
    pub fn is_empty_between(&self, start_y: i32, end_y: i32) -> bool {
        let cubes = block_to_cube(start_y)..=block_to_cube(end_y);
        self.provider
            .resident_units()
            .iter()
            .filter(|section| cubes.contains(&section.y()))
            .all(|section| section.is_empty())
    }

    /// Re-derive the height map from loaded blocks, returning repaired slots.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn reconcile_heights(&self) -> usize {
        let mut heights = self.height_map.write();
        self.reconcile_locked(&mut **heights)
    }

    fn reconcile_locked(&self, heights: &mut dyn HeightMap) -> usize {
        let probe = ProviderProbe::new(&self.provider, &self.opacity);
        let repaired = heights.reconcile(&probe);
        if repaired > 0 {
            tracing::warn!(column = %self.pos, repaired, "repaired height map");
        }
        repaired
    }

    fn seed_heights(&self, heights: &mut dyn HeightMap, section: &Cube) {
        let base_y = section.pos().min_block().y;
        let probe = ProviderProbe::new(&self.provider, &self.opacity);
        for (local, opacity) in section.opaque_blocks(&self.opacity) {
            heights.on_opacity_change(
                usize::from(local.x),
                base_y + i32::from(local.y),
                usize::from(local.z),
                opacity,
                &probe,
            );
        }
    }

    // Entities

    /// Add an entity to the cube containing `position`.
    ///
    /// The cube index is clamped to the column bounds. Returns the index the
    /// entity was stored at.
    pub fn add_entity(&self, entity: Entity, position: DVec3) -> Result<i32> {
        let block = BlockPos::from(position);
        let actual = block.column_pos();
        if actual != self.pos {
            tracing::warn!(
                expected = %self.pos,
                %actual,
                ?entity,
                "entity added to the wrong column"
            );
            return Err(Error::EntityOutsideColumn {
                expected: self.pos,
                actual,
            });
        }
        let index = self.clamp_index(block_to_cube(block.y));
        self.provider
            .unit_or_create(index)?
            .with_entities_mut(|entities| entities.insert(entity));
        Ok(index)
    }

    /// Remove an entity from the cube at `index` (clamped to bounds).
    ///
    /// Returns whether the entity was present; a missing cube is an error.
    pub fn remove_entity(&self, entity: Entity, index: i32) -> Result<bool> {
        let index = self.clamp_index(index);
        let section = self.provider.unit(index)?.ok_or_else(|| self.missing(index))?;
        Ok(section.with_entities_mut(|entities| entities.remove(entity)))
    }

    /// Entities stored in the cubes overlapping `min_y..=max_y`.
    pub fn entities_in_range(&self, min_y: i32, max_y: i32) -> Vec<Entity> {
        self.entities_in_cubes(block_to_cube(min_y), block_to_cube(max_y))
    }

    /// Entities stored in cubes close enough to touch `bounds`.
    pub fn entities_in_box(&self, bounds: &Aabb) -> Vec<Entity> {
        let (low, high) = bounds.cube_y_range(ENTITY_REACH);
        self.entities_in_cubes(low, high)
    }

    fn entities_in_cubes(&self, low: i32, high: i32) -> Vec<Entity> {
        let cubes = self.clamp_index(low)..=self.clamp_index(high);
        let mut found = Vec::new();
        for section in self.provider.resident_units() {
            if cubes.contains(&section.y()) {
                section.with_entities(|entities| found.extend(entities.iter()));
            }
        }
        found
    }

    // Block entities

    /// Attach a block entity; ignored unless the owning cube is loaded.
    pub fn add_block_entity(&self, pos: BlockPos, entity: Entity) -> Result<bool> {
        let (cube, local) = self.split(pos)?;
        match self.provider.unit(cube.y)? {
            Some(section) if section.is_loaded() => {
                section.insert_block_entity(local, entity);
                Ok(true)
            }
            _ => {
                tracing::debug!(%pos, "dropped block entity for unloaded cube");
                Ok(false)
            }
        }
    }

    pub fn block_entity(&self, pos: BlockPos) -> Result<Option<Entity>> {
        let (cube, local) = self.split(pos)?;
        Ok(self
            .provider
            .unit(cube.y)?
            .and_then(|section| section.block_entity(local)))
    }

    pub fn remove_block_entity(&self, pos: BlockPos) -> Result<Option<Entity>> {
        let (cube, local) = self.split(pos)?;
        Ok(self
            .provider
            .unit(cube.y)?
            .and_then(|section| section.remove_block_entity(local)))
    }

    // Redirected section access

    /// Read the storage at `index`; `None` if absent.
    pub fn with_storage<F, R>(&self, index: i32, f: F) -> Result<R>
    where
        F: FnOnce(Option<&ArrayStorage>) -> R,
    {
        match self.provider.unit(index)? {
            Some(section) => Ok(section.with_storage(f)),
            None => Ok(f(None)),
        }
    }

    /// Mutate the storage at `index` in place.
    ///
    /// With `create` the cube and its storage are created first. Without it a
    /// missing cube is an error and a cube without storage yields `None`.
    /// Heights are not updated; call [`Column::reconcile_heights`] afterwards.
    pub fn with_storage_mut<F, R>(&self, index: i32, create: bool, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut ArrayStorage) -> R,
    {
        if create {
            let section = self.provider.unit_or_create(index)?;
            return Ok(Some(section.with_storage_or_create(self.config.has_sky, f)));
        }
        let section = self.provider.unit(index)?.ok_or_else(|| self.missing(index))?;
        Ok(section.with_storage_mut(f))
    }

    /// Install block storage at `index` and bring the height map up to date.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn set_storage(&self, index: i32, storage: ArrayStorage) -> Result<()> {
        let mut heights = self.height_map.write();
        let replaces_blocks = self
            .provider
            .unit(index)?
            .is_some_and(|section| !section.is_empty());
        self.provider.install_storage(index, storage)?;

        if replaces_blocks {
            self.reconcile_locked(&mut **heights);
        } else {
            let section = self.provider.unit_or_create(index)?;
            self.seed_heights(&mut **heights, &section);
        }
        Ok(())
    }

    /// Replace every section's storage, then rebuild the height map.
    pub fn replace_storages(&self, storages: Vec<Option<ArrayStorage>>) -> Result<()> {
        let mut heights = self.height_map.write();
        self.provider.replace_storages(storages)?;
        self.reconcile_locked(&mut **heights);
        Ok(())
    }

    /// Read the entity set at `index`; an absent cube reads as empty.
    pub fn with_entities<F, R>(&self, index: i32, f: F) -> Result<R>
    where
        F: FnOnce(&EntityContainer) -> R,
    {
        match self.provider.unit(index)? {
            Some(section) => Ok(section.with_entities(f)),
            None => Ok(f(&EntityContainer::new())),
        }
    }

    /// Mutate the entity set at `index`, creating the cube if `create` is set.
    pub fn with_entities_mut<F, R>(&self, index: i32, create: bool, f: F) -> Result<R>
    where
        F: FnOnce(&mut EntityContainer) -> R,
    {
        let section = if create {
            self.provider.unit_or_create(index)?
        } else {
            self.provider.unit(index)?.ok_or_else(|| self.missing(index))?
        };
        Ok(section.with_entities_mut(f))
    }

    /// Returns true if the cube holding block Y `y` is loaded.
    pub fn is_block_loaded(&self, y: i32) -> bool {
        matches!(self.provider.unit(block_to_cube(y)), Ok(Some(section)) if section.is_loaded())
    }

    /// Valid section indices of this column.
    pub fn bounds(&self) -> Range<i32> {
        self.provider.bounds()
    }

    /// Snapshot of all resident cubes in ascending order.
    pub fn loaded_cubes(&self) -> Vec<Arc<Cube>> {
        self.provider.resident_units()
    }

    /// Snapshot of resident cubes holding any block.
    pub fn storages_to_tick(&self) -> Vec<Arc<Cube>> {
        let mut cubes = self.provider.resident_units();
        cubes.retain(|cube| !cube.is_empty());
        cubes
    }
}

impl LegacyColumn {
    pub fn new(pos: ColumnPos, config: Arc<WorldConfig>, opacity: Arc<OpacityTable>) -> Self {
        Self::with_provider(NativeStorage::new(pos), config, opacity)
    }
}

impl CubicColumn {
    pub fn new(pos: ColumnPos, config: Arc<WorldConfig>, opacity: Arc<OpacityTable>) -> Self {
        let provider = CubeStorage::new(pos, &config);
        Self::with_provider(provider, config, opacity)
    }

    /// The column's cube map.
    pub fn cubes(&self) -> &CubeMap {
        self.provider.cubes()
    }

    /// Start building the cube at `y` outside of the column.
    pub fn prime_cube(&self, y: i32) -> Result<PrimedCube> {
        self.provider.begin_construction(y)
    }

    /// Publish a primed cube and add its opaque blocks to the height map.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn commit_cube(&self, primed: PrimedCube) -> Result<Arc<Cube>> {
        let mut heights = self.height_map.write();
        let cube = self.provider.commit(primed)?;
        self.seed_heights(&mut **heights, &cube);
        tracing::debug!(pos = %cube.pos(), blocks = cube.non_air_count(), "committed cube");
        Ok(cube)
    }

    /// Evict the cube at `y` and update the height map.
    ///
    /// Returns the evicted cube for persisting; `None` if it was not resident.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn unload_cube(&self, y: i32) -> Option<Arc<Cube>> {
        let mut heights = self.height_map.write();
        let cube = self.provider.remove(y)?;
        let probe = ProviderProbe::new(&self.provider, &self.opacity);
        heights.on_range_unloaded(cube_to_min_block(y), cube_to_max_block(y), &probe);
        tracing::debug!(pos = %cube.pos(), "unloaded cube");
        Some(cube)
    }
}

/// A column of either layout, fixed when the column is created.
pub enum AnyColumn {
    Legacy(LegacyColumn),
    Cubic(CubicColumn),
}

macro_rules! dispatch {
    ($self:expr, $column:ident => $body:expr) => {
        match $self {
            AnyColumn::Legacy($column) => $body,
            AnyColumn::Cubic($column) => $body,
        }
    };
}

impl AnyColumn {
    /// Create a column whose layout follows [`WorldConfig::cubic`].
    pub fn new(pos: ColumnPos, config: Arc<WorldConfig>, opacity: Arc<OpacityTable>) -> Result<Self> {
        config.validate()?;
        Ok(if config.cubic {
            Self::Cubic(CubicColumn::new(pos, config, opacity))
        } else {
            Self::Legacy(LegacyColumn::new(pos, config, opacity))
        })
    }

    pub fn is_cubic(&self) -> bool {
        matches!(self, Self::Cubic(_))
    }

    pub fn as_cubic(&self) -> Option<&CubicColumn> {
        match self {
            Self::Cubic(column) => Some(column),
            Self::Legacy(_) => None,
        }
    }

    pub fn pos(&self) -> ColumnPos {
        dispatch!(self, column => column.pos())
    }

    pub fn block(&self, pos: BlockPos) -> Result<BlockId> {
        dispatch!(self, column => column.block(pos))
    }

    pub fn set_block(&self, pos: BlockPos, block: BlockId) -> Result<BlockId> {
        dispatch!(self, column => column.set_block(pos, block))
    }

    pub fn light(&self, layer: LightLayer, pos: BlockPos) -> Result<u8> {
        dispatch!(self, column => column.light(layer, pos))
    }

    pub fn set_light(&self, layer: LightLayer, pos: BlockPos, level: u8) -> Result<()> {
        dispatch!(self, column => column.set_light(layer, pos, level))
    }

    pub fn top_block_y(&self, local_x: usize, local_z: usize) -> i32 {
        dispatch!(self, column => column.top_block_y(local_x, local_z))
    }

    pub fn top_block_y_below(&self, local_x: usize, local_z: usize, y: i32) -> Option<i32> {
        dispatch!(self, column => column.top_block_y_below(local_x, local_z, y))
    }

    pub fn opacity_above(&self, local_x: usize, y: i32, local_z: usize) -> Option<u64> {
        dispatch!(self, column => column.opacity_above(local_x, y, local_z))
    }

    pub fn height_value(&self, local_x: usize, local_z: usize) -> i32 {
        dispatch!(self, column => column.height_value(local_x, local_z))
    }

    pub fn precipitation_height(&self, local_x: usize, local_z: usize) -> i32 {
        dispatch!(self, column => column.precipitation_height(local_x, local_z))
    }

    pub fn top_filled_segment(&self) -> i32 {
        dispatch!(self, column => column.top_filled_segment())
    }

    pub fn is_empty_between(&self, start_y: i32, end_y: i32) -> bool {
        dispatch!(self, column => column.is_empty_between(start_y, end_y))
    }

    pub fn add_entity(&self, entity: Entity, position: DVec3) -> Result<i32> {
        dispatch!(self, column => column.add_entity(entity, position))
    }

    pub fn remove_entity(&self, entity: Entity, index: i32) -> Result<bool> {
        dispatch!(self, column => column.remove_entity(entity, index))
    }

    pub fn set_storage(&self, index: i32, storage: ArrayStorage) -> Result<()> {
        dispatch!(self, column => column.set_storage(index, storage))
    }

    pub fn replace_storages(&self, storages: Vec<Option<ArrayStorage>>) -> Result<()> {
        dispatch!(self, column => column.replace_storages(storages))
    }

    pub fn is_block_loaded(&self, y: i32) -> bool {
        dispatch!(self, column => column.is_block_loaded(y))
    }

    pub fn loaded_cubes(&self) -> Vec<Arc<Cube>> {
        dispatch!(self, column => column.loaded_cubes())
    }

    pub fn storages_to_tick(&self) -> Vec<Arc<Cube>> {
        dispatch!(self, column => column.storages_to_tick())
    }

    pub fn reconcile_heights(&self) -> usize {
        dispatch!(self, column => column.reconcile_heights())
    }
}
