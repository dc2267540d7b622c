//! Coordinate systems for cube-based worlds.
//!
//! Block coordinates are split into a cube coordinate (floor division by
//! [`CUBE_SIZE`]) and a local coordinate in `0..CUBE_SIZE`. Both are exact for
//! negative input: arithmetic shifts floor toward negative infinity and the
//! mask always yields a non-negative remainder.

use crate::constants::{CUBE_BITS, CUBE_MASK, CUBE_SIZE};
use bytemuck::{Pod, Zeroable};
use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

/// Cube coordinate containing the given block coordinate.
#[inline]
pub const fn block_to_cube(v: i32) -> i32 {
    v >> CUBE_BITS
}

/// Local coordinate of a block inside its cube, always in `0..CUBE_SIZE`.
#[inline]
pub const fn block_to_local(v: i32) -> i32 {
    v & CUBE_MASK
}

/// Lowest block coordinate inside the given cube.
#[inline]
pub const fn cube_to_min_block(c: i32) -> i32 {
    c << CUBE_BITS
}

/// Highest block coordinate inside the given cube.
#[inline]
pub const fn cube_to_max_block(c: i32) -> i32 {
    cube_to_min_block(c) + CUBE_MASK
}

/// Block coordinate from a cube coordinate and a local offset.
#[inline]
pub const fn local_to_block(cube: i32, local: i32) -> i32 {
    cube_to_min_block(cube) + local
}

/// Position within a cube (0 to CUBE_SIZE-1 per axis).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub _pad: u8,
}

impl LocalPos {
    /// Create a new local position
    #[inline]
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!((x as usize) < CUBE_SIZE);
        debug_assert!((y as usize) < CUBE_SIZE);
        debug_assert!((z as usize) < CUBE_SIZE);
        Self { x, y, z, _pad: 0 }
    }

    /// Convert to linear index for flat array storage (y-major layers)
    #[inline]
    pub const fn to_index(self) -> usize {
        self.x as usize
            + (self.z as usize) * CUBE_SIZE
            + (self.y as usize) * CUBE_SIZE * CUBE_SIZE
    }

    /// Create from linear index
    #[inline]
    pub const fn from_index(index: usize) -> Self {
        let x = (index % CUBE_SIZE) as u8;
        let z = ((index / CUBE_SIZE) % CUBE_SIZE) as u8;
        let y = (index / (CUBE_SIZE * CUBE_SIZE)) as u8;
        Self { x, y, z, _pad: 0 }
    }
}

/// Cube position in cube coordinates.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct CubePos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub _pad: i32,
}

impl CubePos {
    /// Create a new cube position
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z, _pad: 0 }
    }

    /// Column this cube belongs to
    #[inline]
    pub const fn column_pos(self) -> ColumnPos {
        ColumnPos::new(self.x, self.z)
    }

    /// Lowest corner of the cube in block coordinates
    #[inline]
    pub const fn min_block(self) -> BlockPos {
        BlockPos::new(
            cube_to_min_block(self.x),
            cube_to_min_block(self.y),
            cube_to_min_block(self.z),
        )
    }
}

impl From<IVec3> for CubePos {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl std::fmt::Display for CubePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Horizontal position of a column in cube coordinates.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct ColumnPos {
    pub x: i32,
    pub z: i32,
}

impl ColumnPos {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Cube at the given vertical index of this column
    #[inline]
    pub const fn cube(self, y: i32) -> CubePos {
        CubePos::new(self.x, y, self.z)
    }
}

impl std::fmt::Display for ColumnPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Block position in world block coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    /// Create a new block position
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Get the cube containing this position
    #[inline]
    pub const fn cube_pos(self) -> CubePos {
        CubePos::new(
            block_to_cube(self.x),
            block_to_cube(self.y),
            block_to_cube(self.z),
        )
    }

    /// Get the column containing this position
    #[inline]
    pub const fn column_pos(self) -> ColumnPos {
        ColumnPos::new(block_to_cube(self.x), block_to_cube(self.z))
    }

    /// Get the local position within the cube
    #[inline]
    pub const fn local_pos(self) -> LocalPos {
        LocalPos::new(
            block_to_local(self.x) as u8,
            block_to_local(self.y) as u8,
            block_to_local(self.z) as u8,
        )
    }

    /// Split into cube and local position
    #[inline]
    pub const fn split(self) -> (CubePos, LocalPos) {
        (self.cube_pos(), self.local_pos())
    }

    /// Create from cube and local position
    #[inline]
    pub const fn from_cube_local(cube: CubePos, local: LocalPos) -> Self {
        Self::new(
            local_to_block(cube.x, local.x as i32),
            local_to_block(cube.y, local.y as i32),
            local_to_block(cube.z, local.z as i32),
        )
    }
}

impl From<IVec3> for BlockPos {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<DVec3> for BlockPos {
    fn from(v: DVec3) -> Self {
        Self::new(v.x.floor() as i32, v.y.floor() as i32, v.z.floor() as i32)
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_pos_index_roundtrip() {
        for index in 0..CUBE_SIZE * CUBE_SIZE * CUBE_SIZE {
            assert_eq!(LocalPos::from_index(index).to_index(), index);
        }
    }

    #[test]
    fn block_to_cube_floors_negative() {
        assert_eq!(block_to_cube(-1), -1);
        assert_eq!(block_to_cube(-16), -1);
        assert_eq!(block_to_cube(-17), -2);
        assert_eq!(block_to_cube(15), 0);
        assert_eq!(block_to_cube(16), 1);
    }

    #[test]
    fn block_to_local_is_non_negative() {
        assert_eq!(block_to_local(-1), 15);
        assert_eq!(block_to_local(-16), 0);
        assert_eq!(block_to_local(-17), 15);
        assert_eq!(block_to_local(33), 1);
    }

    #[test]
    fn cube_bounds_contain_block() {
        let samples = (-1000..1000)
            .chain([i32::MIN, i32::MIN + 1, i32::MAX - 16, i32::MAX - 1])
            .chain((0..31).map(|s| 1 << s))
            .chain((0..31).map(|s| -(1 << s)));
        for v in samples {
            let cube = block_to_cube(v);
            assert!(cube_to_min_block(cube) <= v);
            assert!(v <= cube_to_max_block(cube));
            let local = block_to_local(v);
            assert!((0..CUBE_SIZE as i32).contains(&local));
            assert_eq!(local_to_block(cube, local), v);
        }
    }

    #[test]
    fn block_pos_cube_local_roundtrip() {
        let pos = BlockPos::new(100, -50, -200);
        let (cube, local) = pos.split();
        assert_eq!(cube, CubePos::new(6, -4, -13));
        assert_eq!(BlockPos::from_cube_local(cube, local), pos);
    }

    #[test]
    fn dvec3_floors_into_block() {
        let pos = BlockPos::from(DVec3::new(-0.5, 64.9, 15.99));
        assert_eq!(pos, BlockPos::new(-1, 64, 15));
        assert_eq!(pos.column_pos(), ColumnPos::new(-1, 0));
    }
}
