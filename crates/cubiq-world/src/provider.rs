//! Indexed storage providers backing a column.
//!
//! A column reads and writes its per-section data through a
//! [`StorageProvider`]. Legacy columns use [`NativeStorage`], a fixed array of
//! sixteen sections; virtualized columns use [`CubeStorage`], a sparse
//! [`CubeMap`] spanning the whole world height.

use std::cell::OnceCell;
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

use cubiq_core::config::WorldConfig;
use cubiq_core::constants::LEGACY_SECTION_COUNT;
use cubiq_core::coords::{
    block_to_cube, block_to_local, cube_to_max_block, cube_to_min_block, ColumnPos, LocalPos,
};
use cubiq_core::error::{Error, Result};
use cubiq_core::types::OpacityTable;
use cubiq_voxel::ArrayStorage;

use crate::cube::Cube;
use crate::cube_map::{CubeMap, PrimedCube};
use crate::height_map::OpacityProbe;

/// Per-index access to the sections of a column.
pub trait StorageProvider: Send + Sync {
    /// Column this provider belongs to.
    fn column(&self) -> ColumnPos;

    /// Valid section indices.
    fn bounds(&self) -> Range<i32>;

    /// Section at `index`, without creating it.
    fn unit(&self, index: i32) -> Result<Option<Arc<Cube>>>;

    /// Section at `index`, creating an empty one if needed.
    fn unit_or_create(&self, index: i32) -> Result<Arc<Cube>>;

    /// Install block storage at `index`.
    fn install_storage(&self, index: i32, storage: ArrayStorage) -> Result<()>;

    /// Replace the storage of every section at once.
    fn replace_storages(&self, storages: Vec<Option<ArrayStorage>>) -> Result<()>;

    /// Snapshot of all resident sections in ascending order.
    fn resident_units(&self) -> Vec<Arc<Cube>>;

    fn check_bounds(&self, index: i32) -> Result<()> {
        let bounds = self.bounds();
        if bounds.contains(&index) {
            Ok(())
        } else {
            Err(Error::OutOfBoundsVerticalIndex {
                index,
                min: bounds.start,
                max: bounds.end,
            })
        }
    }
}

/// Fixed array of sixteen always-present sections.
pub struct NativeStorage {
    column: ColumnPos,
    sections: Vec<Arc<Cube>>,
}

impl NativeStorage {
    pub fn new(column: ColumnPos) -> Self {
        let sections = (0..LEGACY_SECTION_COUNT as i32)
            .map(|y| {
                let section = Cube::new(column.cube(y));
                section.mark_loaded();
                Arc::new(section)
            })
            .collect();
        Self { column, sections }
    }

    fn section(&self, index: i32) -> Result<&Arc<Cube>> {
        self.check_bounds(index)?;
        Ok(&self.sections[index as usize])
    }
}

impl StorageProvider for NativeStorage {
    fn column(&self) -> ColumnPos {
        self.column
    }

    fn bounds(&self) -> Range<i32> {
        0..LEGACY_SECTION_COUNT as i32
    }

    fn unit(&self, index: i32) -> Result<Option<Arc<Cube>>> {
        self.section(index).map(|section| Some(Arc::clone(section)))
    }

    fn unit_or_create(&self, index: i32) -> Result<Arc<Cube>> {
        self.section(index).map(Arc::clone)
    }

    fn install_storage(&self, index: i32, storage: ArrayStorage) -> Result<()> {
        self.section(index)?.replace_storage(Some(storage));
        Ok(())
    }

    fn replace_storages(&self, storages: Vec<Option<ArrayStorage>>) -> Result<()> {
        if storages.len() != self.sections.len() {
            return Err(Error::OutOfBoundsVerticalIndex {
                index: storages.len() as i32,
                min: 0,
                max: self.sections.len() as i32,
            });
        }
        for (section, storage) in self.sections.iter().zip(storages) {
            section.replace_storage(storage);
        }
        Ok(())
    }

    fn resident_units(&self) -> Vec<Arc<Cube>> {
        self.sections.clone()
    }
}

/// Sparse cube map spanning the configured world height.
pub struct CubeStorage {
    cubes: CubeMap,
}

impl CubeStorage {
    pub fn new(column: ColumnPos, config: &WorldConfig) -> Self {
        Self {
            cubes: CubeMap::new(column, config.min_cube_y()..config.max_cube_y()),
        }
    }

    /// The underlying cube map.
    pub fn cubes(&self) -> &CubeMap {
        &self.cubes
    }

    pub fn begin_construction(&self, y: i32) -> Result<PrimedCube> {
        self.cubes.begin_construction(y)
    }

    pub fn commit(&self, primed: PrimedCube) -> Result<Arc<Cube>> {
        self.cubes.commit(primed)
    }

    pub fn remove(&self, y: i32) -> Option<Arc<Cube>> {
        self.cubes.remove(y)
    }
}

impl StorageProvider for CubeStorage {
    fn column(&self) -> ColumnPos {
        self.cubes.column()
    }

    fn bounds(&self) -> Range<i32> {
        self.cubes.bounds()
    }

    fn unit(&self, index: i32) -> Result<Option<Arc<Cube>>> {
        self.cubes.get(index)
    }

    fn unit_or_create(&self, index: i32) -> Result<Arc<Cube>> {
        self.cubes.get_or_create(index)
    }

    fn install_storage(&self, index: i32, storage: ArrayStorage) -> Result<()> {
        self.cubes.get_or_create(index)?.set_storage(storage)
    }

    fn replace_storages(&self, _storages: Vec<Option<ArrayStorage>>) -> Result<()> {
        Err(Error::Unsupported("replacing the storage array of a cubic column"))
    }

    fn resident_units(&self) -> Vec<Arc<Cube>> {
        self.cubes.resident_cubes()
    }
}

/// Loaded section indices of a provider, ascending.
struct ResidentSections {
    loaded: Vec<i32>,
    /// Loaded sections that hold at least one block.
    filled: Vec<i32>,
}

/// [`OpacityProbe`] over the loaded sections of a provider.
///
/// The set of loaded sections is read once, on first use, so scans step over
/// absent and empty sections without touching the provider.
pub struct ProviderProbe<'a, P: ?Sized> {
    provider: &'a P,
    opacity: &'a OpacityTable,
    sections: OnceCell<ResidentSections>,
}

impl<'a, P: StorageProvider + ?Sized> ProviderProbe<'a, P> {
    pub fn new(provider: &'a P, opacity: &'a OpacityTable) -> Self {
        Self {
            provider,
            opacity,
            sections: OnceCell::new(),
        }
    }

    fn sections(&self) -> &ResidentSections {
        self.sections.get_or_init(|| {
            let units = self.provider.resident_units();
            let loaded = units.iter().filter(|unit| unit.is_loaded());
            ResidentSections {
                loaded: loaded.clone().map(|unit| unit.y()).collect(),
                filled: loaded
                    .filter(|unit| !unit.is_empty())
                    .map(|unit| unit.y())
                    .collect(),
            }
        })
    }
}

impl<P: StorageProvider + ?Sized> OpacityProbe for ProviderProbe<'_, P> {
    fn opacity_at(&self, local_x: usize, y: i32, local_z: usize) -> u8 {
        let index = block_to_cube(y);
        let Ok(Some(section)) = self.provider.unit(index) else {
            return 0;
        };
        if !section.is_loaded() {
            return 0;
        }
        let local = LocalPos::new(local_x as u8, block_to_local(y) as u8, local_z as u8);
        self.opacity.opacity(section.block(local))
    }

    fn scan_floor(&self) -> i32 {
        self.sections().loaded.first().map_or(0, |&low| cube_to_min_block(low))
    }

    fn scan_ceiling(&self) -> i32 {
        self.sections().loaded.last().map_or(-1, |&high| cube_to_max_block(high))
    }

    fn next_candidate_below(&self, y: i32) -> Option<i32> {
        let filled = &self.sections().filled;
        let index = block_to_cube(y);
        let below = filled.partition_point(|&section| section <= index);
        let section = *filled.get(below.checked_sub(1)?)?;
        Some(if section == index {
            y
        } else {
            cube_to_max_block(section)
        })
    }

    fn loaded_ranges(&self) -> Vec<RangeInclusive<i32>> {
        let mut ranges: Vec<RangeInclusive<i32>> = Vec::new();
        for &section in &self.sections().loaded {
            let (low, high) = (cube_to_min_block(section), cube_to_max_block(section));
            match ranges.last_mut() {
                Some(last) if last.end().checked_add(1) == Some(low) => {
                    *last = *last.start()..=high;
                }
                _ => ranges.push(low..=high),
            }
        }
        ranges
    }
}
