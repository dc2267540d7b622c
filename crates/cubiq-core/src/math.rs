//! Bounding volumes used for entity queries.

use glam::DVec3;

use crate::constants::CUBE_SIZE;

/// Axis-Aligned Bounding Box in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create a new AABB from its corners
    #[inline]
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Cube Y indices whose entities can touch this box.
    ///
    /// Entities are stored by the cube of their feet, so the range is widened
    /// by `margin` blocks to catch entities that straddle a cube boundary.
    pub fn cube_y_range(&self, margin: f64) -> (i32, i32) {
        let size = CUBE_SIZE as f64;
        let low = ((self.min.y - margin) / size).floor() as i32;
        let high = ((self.max.y + margin) / size).floor() as i32;
        (low, high.max(low))
    }
}
