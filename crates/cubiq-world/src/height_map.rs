//! Incremental surface index of a column.
//!
//! A height map tracks, for each of the 16x16 block slots of a column, the Y
//! of the highest block with non-zero light opacity. It is fed opacity change
//! notifications and never rescans the whole column during normal operation.
//! When it needs to look below its cached top it asks an [`OpacityProbe`].

use std::ops::RangeInclusive;

use cubiq_core::config::Authority;
use cubiq_core::constants::{CUBE_SIZE, NO_HEIGHT};

pub use crate::client_height_map::ClientHeightMap;
pub use crate::server_height_map::ServerHeightMap;

/// Number of block slots in a column footprint.
pub const SLOT_COUNT: usize = CUBE_SIZE * CUBE_SIZE;

/// Index of a column slot in a flat height array.
#[inline]
pub const fn slot_index(local_x: usize, local_z: usize) -> usize {
    debug_assert!(local_x < CUBE_SIZE && local_z < CUBE_SIZE);
    local_x | (local_z << 4)
}

/// Read access to the opacity of loaded blocks of a column.
pub trait OpacityProbe {
    /// Light opacity at a block; unloaded blocks read as 0.
    fn opacity_at(&self, local_x: usize, y: i32, local_z: usize) -> u8;

    /// Lowest Y that can hold a loaded block, inclusive.
    fn scan_floor(&self) -> i32;

    /// Highest Y that can hold a loaded block, inclusive.
    fn scan_ceiling(&self) -> i32;

    /// Highest Y at or below `y` that may hold an opaque block, or `None`
    /// when nothing loaded lies at or below it.
    ///
    /// Probes that know which cubes are absent or empty skip over them.
    fn next_candidate_below(&self, y: i32) -> Option<i32> {
        (y >= self.scan_floor()).then(|| y.min(self.scan_ceiling()))
    }

    /// Inclusive Y ranges whose blocks are loaded, in ascending order.
    fn loaded_ranges(&self) -> Vec<RangeInclusive<i32>> {
        let (floor, ceiling) = (self.scan_floor(), self.scan_ceiling());
        if floor <= ceiling {
            vec![floor..=ceiling]
        } else {
            Vec::new()
        }
    }
}

/// Y values a downward scan from `from_y` has to read, stopping below `floor`.
pub fn candidate_ys(
    probe: &dyn OpacityProbe,
    from_y: i32,
    floor: i32,
) -> impl Iterator<Item = i32> + '_ {
    let mut next = Some(from_y);
    std::iter::from_fn(move || {
        let y = probe.next_candidate_below(next?)?;
        if y < floor {
            next = None;
            return None;
        }
        next = y.checked_sub(1);
        Some(y)
    })
}

/// Scan down from `from_y` for the first opaque block of a slot.
///
/// The scan is clipped to the probe's loaded range and returns [`NO_HEIGHT`]
/// when nothing opaque is found.
pub fn probe_top(probe: &dyn OpacityProbe, local_x: usize, local_z: usize, from_y: i32) -> i32 {
    let start = from_y.min(probe.scan_ceiling());
    let found = candidate_ys(probe, start, probe.scan_floor())
        .find(|&y| probe.opacity_at(local_x, y, local_z) > 0);
    tracing::trace!(local_x, local_z, from_y, ?found, "probed column slot");
    found.unwrap_or(NO_HEIGHT)
}

/// Height map variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeightMapKind {
    /// Keeps every opaque block; used with local simulation authority.
    Full,
    /// Keeps only the top block; used as a display cache.
    Minimal,
}

impl From<Authority> for HeightMapKind {
    fn from(authority: Authority) -> Self {
        match authority {
            Authority::Server => Self::Full,
            Authority::Client => Self::Minimal,
        }
    }
}

/// Surface index of one column.
pub trait HeightMap: Send + Sync {
    /// Report the new light opacity of a block after it was written.
    fn on_opacity_change(
        &mut self,
        local_x: usize,
        block_y: i32,
        local_z: usize,
        opacity: u8,
        probe: &dyn OpacityProbe,
    );

    /// Y of the highest opaque block of a slot, or [`NO_HEIGHT`].
    fn top_block_y(&self, local_x: usize, local_z: usize) -> i32;

    /// Notify that the blocks in `min_y..=max_y` are no longer loaded.
    fn on_range_unloaded(&mut self, min_y: i32, max_y: i32, probe: &dyn OpacityProbe);

    /// Re-derive every slot from the probe and repair the ones that drifted.
    ///
    /// Returns the number of repaired slots.
    fn reconcile(&mut self, probe: &dyn OpacityProbe) -> usize;

    fn kind(&self) -> HeightMapKind;

    /// Y of the highest opaque block strictly below `y`, or [`NO_HEIGHT`].
    ///
    /// `None` when the map does not keep blocks under the top.
    fn top_block_y_below(&self, _local_x: usize, _local_z: usize, _y: i32) -> Option<i32> {
        None
    }

    /// Sum of the opacities of the blocks strictly above `y`.
    ///
    /// `None` when the map does not keep blocks under the top.
    fn opacity_above(&self, _local_x: usize, _y: i32, _local_z: usize) -> Option<u64> {
        None
    }

    /// Highest top block across all slots, or [`NO_HEIGHT`].
    fn highest_top_block_y(&self) -> i32 {
        (0..SLOT_COUNT)
            .map(|i| self.top_block_y(i % CUBE_SIZE, i / CUBE_SIZE))
            .max()
            .unwrap_or(NO_HEIGHT)
    }

    /// Lowest top block among slots that have one, or [`NO_HEIGHT`].
    fn lowest_top_block_y(&self) -> i32 {
        (0..SLOT_COUNT)
            .map(|i| self.top_block_y(i % CUBE_SIZE, i / CUBE_SIZE))
            .filter(|&y| y != NO_HEIGHT)
            .min()
            .unwrap_or(NO_HEIGHT)
    }
}

/// Create an empty height map of the given kind.
pub fn new_height_map(kind: HeightMapKind) -> Box<dyn HeightMap> {
    match kind {
        HeightMapKind::Full => Box::new(ServerHeightMap::new()),
        HeightMapKind::Minimal => Box::new(ClientHeightMap::new()),
    }
}
