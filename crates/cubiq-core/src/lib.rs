//! Core types, coordinates, and configuration for Cubiq.
//!
//! This crate provides the foundational types shared by the storage and world
//! crates:
//! - Block ids and the light opacity table
//! - Coordinate systems (block, cube, column, local)
//! - World height configuration
//! - The crate-wide error type

pub mod config;
pub mod coords;
pub mod error;
pub mod math;
pub mod types;

pub use config::{Authority, WorldConfig};
pub use coords::{BlockPos, ColumnPos, CubePos, LocalPos};
pub use error::{Error, Result};
pub use types::{BlockId, OpacityTable};

/// Engine-wide constants
pub mod constants {
    /// Edge length of a cube in blocks
    pub const CUBE_SIZE: usize = 16;
    /// Total blocks in a cube (16^3)
    pub const CUBE_VOLUME: usize = CUBE_SIZE * CUBE_SIZE * CUBE_SIZE;
    /// Bits needed to represent a position within a cube (4 bits for 0-15)
    pub const CUBE_BITS: u32 = 4;
    /// Mask extracting the local part of a block coordinate
    pub const CUBE_MASK: i32 = (CUBE_SIZE as i32) - 1;
    /// Number of sections in a legacy fixed-height column
    pub const LEGACY_SECTION_COUNT: usize = 16;
    /// Height marker for a column slot without any opaque block
    pub const NO_HEIGHT: i32 = i32::MIN;
    /// Largest light opacity a block can have
    pub const MAX_OPACITY: u8 = 15;
    /// Brightest light level
    pub const MAX_LIGHT: u8 = 15;
}
