//! Fixed-size block storage for one cube.
//!
//! [`BlockStorage`] is the contract a host section object fulfils; the
//! [`ArrayStorage`] implementation keeps a flat block array plus the two light
//! channels and a count of non-air blocks so emptiness checks are O(1).

use cubiq_core::constants::CUBE_VOLUME;
use cubiq_core::coords::LocalPos;
use cubiq_core::types::BlockId;

use crate::nibble::{LightLayer, NibbleArray};

/// Storage of a 16^3 block volume.
pub trait BlockStorage {
    /// Get the block at a local position.
    fn get(&self, pos: LocalPos) -> BlockId;

    /// Set the block at a local position, returning the previous block.
    fn set(&mut self, pos: LocalPos, block: BlockId) -> BlockId;

    /// Returns true if every block is air.
    fn is_empty(&self) -> bool;

    /// Number of non-air blocks.
    fn non_air_count(&self) -> usize;
}

/// Flat array implementation of [`BlockStorage`] with light channels.
#[derive(Clone)]
pub struct ArrayStorage {
    /// Y coordinate of the lowest block layer, in blocks.
    base_y: i32,
    blocks: Box<[BlockId; CUBE_VOLUME]>,
    sky_light: Option<NibbleArray>,
    block_light: NibbleArray,
    non_air: usize,
}

impl ArrayStorage {
    /// Create an all-air storage whose lowest layer sits at `base_y`.
    ///
    /// Sky light is only tracked when `has_sky` is set, matching worlds
    /// without a sky that never read it.
    pub fn new(base_y: i32, has_sky: bool) -> Self {
        Self {
            base_y,
            blocks: Box::new([BlockId::AIR; CUBE_VOLUME]),
            sky_light: has_sky.then(|| NibbleArray::filled(0)),
            block_light: NibbleArray::filled(0),
            non_air: 0,
        }
    }

    /// Y coordinate of the lowest block layer.
    #[inline]
    pub fn base_y(&self) -> i32 {
        self.base_y
    }

    /// Light level of a channel at a local position.
    pub fn light(&self, layer: LightLayer, pos: LocalPos) -> u8 {
        match layer {
            LightLayer::Sky => self.sky_light.as_ref().map_or(0, |sky| sky.get(pos)),
            LightLayer::Block => self.block_light.get(pos),
        }
    }

    /// Set the light level of a channel. Sky writes are ignored without sky.
    pub fn set_light(&mut self, layer: LightLayer, pos: LocalPos, level: u8) {
        match layer {
            LightLayer::Sky => {
                if let Some(sky) = self.sky_light.as_mut() {
                    sky.set(pos, level);
                }
            }
            LightLayer::Block => self.block_light.set(pos, level),
        }
    }

    /// Whether the sky channel is tracked.
    pub fn has_sky(&self) -> bool {
        self.sky_light.is_some()
    }

    /// Iterate over all non-air blocks with their local positions.
    pub fn solid_blocks(&self) -> impl Iterator<Item = (LocalPos, BlockId)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| block.is_solid())
            .map(|(index, block)| (LocalPos::from_index(index), *block))
    }
}

impl BlockStorage for ArrayStorage {
    #[inline]
    fn get(&self, pos: LocalPos) -> BlockId {
        self.blocks[pos.to_index()]
    }

    fn set(&mut self, pos: LocalPos, block: BlockId) -> BlockId {
        let slot = &mut self.blocks[pos.to_index()];
        let old = std::mem::replace(slot, block);
        match (old.is_air(), block.is_air()) {
            (true, false) => self.non_air += 1,
            (false, true) => self.non_air -= 1,
            _ => {}
        }
        old
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.non_air == 0
    }

    #[inline]
    fn non_air_count(&self) -> usize {
        self.non_air
    }
}

impl std::fmt::Debug for ArrayStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayStorage")
            .field("base_y", &self.base_y)
            .field("non_air", &self.non_air)
            .field("has_sky", &self.has_sky())
            .finish()
    }
}
