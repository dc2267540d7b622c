//! Sparse vertical map of the cubes of one column.

use std::ops::{Deref, Range};
use std::sync::Arc;

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use parking_lot::RwLock;

use cubiq_core::coords::ColumnPos;
use cubiq_core::error::{Error, Result};

use crate::cube::Cube;

/// A cube under construction, not yet visible in its column.
///
/// Queries about the cube during construction go through this handle; the
/// cube only becomes reachable through the map once
/// [`CubeMap::commit`] publishes it.
#[derive(Debug)]
pub struct PrimedCube {
    cube: Cube,
}

impl PrimedCube {
    /// Unwrap the cube without publishing it.
    pub fn into_inner(self) -> Cube {
        self.cube
    }
}

impl Deref for PrimedCube {
    type Target = Cube;

    fn deref(&self) -> &Cube {
        &self.cube
    }
}

/// All resident cubes of one column indexed by cube Y.
///
/// Each map has its own lock, so columns never contend with each other.
pub struct CubeMap {
    column: ColumnPos,
    /// Valid cube Y range.
    bounds: Range<i32>,
    cubes: RwLock<HashMap<i32, Arc<Cube>>>,
}

impl CubeMap {
    /// Create an empty map accepting cube Y in `bounds`.
    pub fn new(column: ColumnPos, bounds: Range<i32>) -> Self {
        Self {
            column,
            bounds,
            cubes: RwLock::new(HashMap::new()),
        }
    }

    pub fn column(&self) -> ColumnPos {
        self.column
    }

    pub fn bounds(&self) -> Range<i32> {
        self.bounds.clone()
    }

    fn check_bounds(&self, y: i32) -> Result<()> {
        if self.bounds.contains(&y) {
            Ok(())
        } else {
            Err(Error::OutOfBoundsVerticalIndex {
                index: y,
                min: self.bounds.start,
                max: self.bounds.end,
            })
        }
    }

    /// Get the cube at `y`, creating and committing an empty one if absent.
    ///
    /// Concurrent callers for the same `y` all observe the same cube.
    pub fn get_or_create(&self, y: i32) -> Result<Arc<Cube>> {
        self.check_bounds(y)?;
        if let Some(cube) = self.cubes.read().get(&y) {
            return Ok(Arc::clone(cube));
        }

        let mut cubes = self.cubes.write();
        let cube = cubes.entry(y).or_insert_with(|| {
            let cube = Cube::new(self.column.cube(y));
            cube.mark_loaded();
            tracing::trace!(pos = %cube.pos(), "created empty cube");
            Arc::new(cube)
        });
        Ok(Arc::clone(cube))
    }

    /// Get the cube at `y` without creating it.
    pub fn get(&self, y: i32) -> Result<Option<Arc<Cube>>> {
        self.check_bounds(y)?;
        Ok(self.cubes.read().get(&y).cloned())
    }

    /// Check if a cube is resident at `y`.
    pub fn contains(&self, y: i32) -> bool {
        self.cubes.read().contains_key(&y)
    }

    /// Start constructing the cube at `y` outside of the map.
    pub fn begin_construction(&self, y: i32) -> Result<PrimedCube> {
        self.check_bounds(y)?;
        if self.contains(y) {
            return Err(Error::CubeAlreadyLoaded {
                pos: self.column.cube(y),
            });
        }
        Ok(PrimedCube {
            cube: Cube::new(self.column.cube(y)),
        })
    }

    /// Publish a primed cube. Never replaces a resident cube.
    pub fn commit(&self, primed: PrimedCube) -> Result<Arc<Cube>> {
        let cube = primed.into_inner();
        let pos = cube.pos();
        debug_assert_eq!(pos.column_pos(), self.column);
        self.check_bounds(pos.y)?;

        match self.cubes.write().entry(pos.y) {
            Entry::Occupied(_) => Err(Error::CubeAlreadyLoaded { pos }),
            Entry::Vacant(slot) => {
                cube.mark_loaded();
                Ok(Arc::clone(slot.insert(Arc::new(cube))))
            }
        }
    }

    /// Remove the cube at `y` and mark it unloaded.
    ///
    /// The map lock is held only for the removal; persisting the returned
    /// cube happens outside of it.
    pub fn remove(&self, y: i32) -> Option<Arc<Cube>> {
        let removed = self.cubes.write().remove(&y);
        if let Some(cube) = &removed {
            cube.mark_unloaded();
        }
        removed
    }

    /// Snapshot of all resident cubes in ascending Y order.
    pub fn resident_cubes(&self) -> Vec<Arc<Cube>> {
        let mut cubes: Vec<_> = self.cubes.read().values().cloned().collect();
        cubes.sort_unstable_by_key(|cube| cube.y());
        cubes
    }

    /// Snapshot of resident cubes whose storage holds any block.
    pub fn storages_to_tick(&self) -> Vec<Arc<Cube>> {
        let mut cubes = self.resident_cubes();
        cubes.retain(|cube| !cube.is_empty());
        cubes
    }

    /// Get the number of resident cubes.
    pub fn len(&self) -> usize {
        self.cubes.read().len()
    }

    /// Check if no cubes are resident.
    pub fn is_empty(&self) -> bool {
        self.cubes.read().is_empty()
    }
}

impl std::fmt::Debug for CubeMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CubeMap")
            .field("column", &self.column)
            .field("bounds", &self.bounds)
            .field("len", &self.len())
            .finish()
    }
}
