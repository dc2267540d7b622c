//! World height configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{CUBE_SIZE, LEGACY_SECTION_COUNT, NO_HEIGHT};
use crate::coords::block_to_cube;
use crate::error::{Error, Result};

/// Which side owns the simulation of a world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Authority {
    /// Simulation is local; height maps keep full opacity data.
    #[default]
    Server,
    /// Display cache only; height maps keep just the top block.
    Client,
}

/// World configuration shared by every column of a world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Lowest block Y of the world (inclusive, cube aligned).
    pub min_height: i32,
    /// Highest block Y of the world (exclusive, cube aligned).
    pub max_height: i32,
    /// Surface estimate used when a column has no known surface.
    pub average_ground_level: i32,
    /// Whether columns are virtualized into cubes.
    pub cubic: bool,
    /// Simulation authority, selects the height map variant.
    pub authority: Authority,
    /// Whether block storage tracks a sky light channel.
    pub has_sky: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            min_height: -(1 << 20),
            max_height: 1 << 20,
            average_ground_level: 64,
            cubic: true,
            authority: Authority::Server,
            has_sky: true,
        }
    }
}

impl WorldConfig {
    /// Configuration of a legacy fixed-height world.
    pub fn legacy() -> Self {
        Self {
            min_height: 0,
            max_height: (LEGACY_SECTION_COUNT * CUBE_SIZE) as i32,
            cubic: false,
            ..Default::default()
        }
    }

    /// Check that the height bounds are usable.
    pub fn validate(&self) -> Result<()> {
        let mask = CUBE_SIZE as i32 - 1;
        if self.min_height & mask != 0 || self.max_height & mask != 0 {
            return Err(Error::InvalidConfig(format!(
                "height bounds {}..{} are not multiples of {CUBE_SIZE}",
                self.min_height, self.max_height
            )));
        }
        if self.min_height <= NO_HEIGHT {
            return Err(Error::InvalidConfig(format!(
                "min height {} collides with the empty height marker",
                self.min_height
            )));
        }
        if self.min_height >= self.max_height {
            return Err(Error::InvalidConfig(format!(
                "min height {} is not below max height {}",
                self.min_height, self.max_height
            )));
        }
        if !self.cubic && (self.min_height != 0 || self.max_height > self.legacy_max_height()) {
            return Err(Error::InvalidConfig(format!(
                "legacy columns only cover 0..{}",
                self.legacy_max_height()
            )));
        }
        Ok(())
    }

    const fn legacy_max_height(&self) -> i32 {
        (LEGACY_SECTION_COUNT * CUBE_SIZE) as i32
    }

    /// Lowest cube Y (inclusive).
    #[inline]
    pub const fn min_cube_y(&self) -> i32 {
        block_to_cube(self.min_height)
    }

    /// Highest cube Y (exclusive).
    #[inline]
    pub const fn max_cube_y(&self) -> i32 {
        block_to_cube(self.max_height)
    }

    /// Clamp a cube Y into the world bounds.
    #[inline]
    pub fn clamp_cube_y(&self, cube_y: i32) -> i32 {
        cube_y.clamp(self.min_cube_y(), self.max_cube_y() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_cube_y(), -(1 << 16));
        assert_eq!(config.max_cube_y(), 1 << 16);
    }

    #[test]
    fn legacy_config_covers_sixteen_sections() {
        let config = WorldConfig::legacy();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_cube_y(), 0);
        assert_eq!(config.max_cube_y(), 16);
    }

    #[test]
    fn unaligned_bounds_are_rejected() {
        let config = WorldConfig {
            min_height: -8,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = WorldConfig {
            min_height: 64,
            max_height: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn lowest_height_must_stay_above_marker() {
        let config = WorldConfig {
            min_height: i32::MIN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = WorldConfig {
            min_height: i32::MIN + CUBE_SIZE as i32,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.min_cube_y(), i32::MIN / CUBE_SIZE as i32 + 1);
    }

    #[test]
    fn clamp_cube_y_stays_in_bounds() {
        let config = WorldConfig::legacy();
        assert_eq!(config.clamp_cube_y(-3), 0);
        assert_eq!(config.clamp_cube_y(40), 15);
        assert_eq!(config.clamp_cube_y(7), 7);
    }
}
