//! Block ids and light opacity.

use bytemuck::{Pod, Zeroable};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_OPACITY;

/// Unique identifier for a block type.
///
/// Block ID 0 is reserved for air (empty space).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Air block (empty space)
    pub const AIR: Self = Self(0);
    /// Stone block
    pub const STONE: Self = Self(1);
    /// Dirt block
    pub const DIRT: Self = Self(2);
    /// Grass block
    pub const GRASS: Self = Self(3);
    /// Glass block (solid but lets light through)
    pub const GLASS: Self = Self(4);
    /// Water block (dims light)
    pub const WATER: Self = Self(5);
    /// Tree leaves block (dims light)
    pub const LEAVES: Self = Self(6);

    /// Returns true if this block is air (empty)
    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this block is solid (not air)
    #[inline]
    pub const fn is_solid(self) -> bool {
        self.0 != 0
    }
}

/// Light opacity of every block type, in `0..=MAX_OPACITY`.
///
/// Air is always fully transparent. Blocks without an explicit entry use the
/// table's default opacity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpacityTable {
    default_opacity: u8,
    overrides: HashMap<BlockId, u8>,
}

impl Default for OpacityTable {
    fn default() -> Self {
        let mut table = Self::uniform(MAX_OPACITY);
        table.set(BlockId::GLASS, 0);
        table.set(BlockId::WATER, 3);
        table.set(BlockId::LEAVES, 1);
        table
    }
}

impl OpacityTable {
    /// Table where every non-air block has the same opacity.
    pub fn uniform(opacity: u8) -> Self {
        Self {
            default_opacity: opacity.min(MAX_OPACITY),
            overrides: HashMap::new(),
        }
    }

    /// Override the opacity of a single block type.
    pub fn set(&mut self, block: BlockId, opacity: u8) {
        if !block.is_air() {
            self.overrides.insert(block, opacity.min(MAX_OPACITY));
        }
    }

    /// Light opacity of the given block.
    #[inline]
    pub fn opacity(&self, block: BlockId) -> u8 {
        if block.is_air() {
            return 0;
        }
        self.overrides
            .get(&block)
            .copied()
            .unwrap_or(self.default_opacity)
    }
}
