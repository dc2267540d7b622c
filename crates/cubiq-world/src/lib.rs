//! Cube-virtualized column storage for Cubiq.
//!
//! A world column is split into 16^3 [`Cube`]s held in a sparse
//! [`CubeMap`]. Columns expose the same block, light, entity and height
//! operations whether they are backed by the sparse map or by a legacy fixed
//! array of sixteen sections, see [`AnyColumn`].

pub mod client_height_map;
pub mod column;
pub mod cube;
pub mod cube_map;
pub mod entity;
pub mod height_map;
pub mod provider;
pub mod queue;
pub mod server_height_map;
pub mod world;

pub use column::{AnyColumn, Column, CubicColumn, LegacyColumn};
pub use cube::{Cube, CubeState};
pub use cube_map::{CubeMap, PrimedCube};
pub use entity::{Entity, EntityContainer};
pub use height_map::{
    new_height_map, ClientHeightMap, HeightMap, HeightMapKind, OpacityProbe, ServerHeightMap,
};
pub use provider::{CubeStorage, NativeStorage, ProviderProbe, StorageProvider};
pub use queue::BatchedQueue;
pub use world::CubicWorld;
