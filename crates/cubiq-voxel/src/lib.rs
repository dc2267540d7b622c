//! Per-cube block storage for Cubiq.
//!
//! A cube's blocks live in an [`ArrayStorage`]: a flat 16^3 block array with
//! packed sky and block light. Hosts that bring their own section type can
//! implement [`BlockStorage`] instead.

pub mod nibble;
pub mod storage;

pub use nibble::{LightLayer, NibbleArray};
pub use storage::{ArrayStorage, BlockStorage};
