//! Minimal height map that caches only the top block of each slot.

use cubiq_core::constants::NO_HEIGHT;

use crate::height_map::{
    probe_top, slot_index, HeightMap, HeightMapKind, OpacityProbe, SLOT_COUNT,
};

/// Top-block cache for columns that do not own simulation.
///
/// An opaque block above the cached top raises it; the cached top turning
/// transparent probes downward for the next opaque block. Every other change
/// leaves the slot untouched.
#[derive(Clone, Debug)]
pub struct ClientHeightMap {
    tops: Box<[i32; SLOT_COUNT]>,
}

impl Default for ClientHeightMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHeightMap {
    pub fn new() -> Self {
        Self {
            tops: Box::new([NO_HEIGHT; SLOT_COUNT]),
        }
    }
}

impl HeightMap for ClientHeightMap {
    fn on_opacity_change(
        &mut self,
        local_x: usize,
        block_y: i32,
        local_z: usize,
        opacity: u8,
        probe: &dyn OpacityProbe,
    ) {
        let top = &mut self.tops[slot_index(local_x, local_z)];
        if block_y > *top {
            if opacity > 0 {
                *top = block_y;
            }
        } else if block_y == *top && *top != NO_HEIGHT && opacity == 0 {
            *top = match block_y.checked_sub(1) {
                Some(below) => probe_top(probe, local_x, local_z, below),
                None => NO_HEIGHT,
            };
        }
    }

    #[inline]
    fn top_block_y(&self, local_x: usize, local_z: usize) -> i32 {
        self.tops[slot_index(local_x, local_z)]
    }

    fn on_range_unloaded(&mut self, min_y: i32, max_y: i32, probe: &dyn OpacityProbe) {
        for index in 0..SLOT_COUNT {
            let top = self.tops[index];
            if top != NO_HEIGHT && (min_y..=max_y).contains(&top) {
                let (x, z) = (index & 15, index >> 4);
                self.tops[index] = match min_y.checked_sub(1) {
                    Some(below) => probe_top(probe, x, z, below),
                    None => NO_HEIGHT,
                };
            }
        }
    }

    fn reconcile(&mut self, probe: &dyn OpacityProbe) -> usize {
        let ceiling = probe.scan_ceiling();
        let mut repaired = 0;
        for index in 0..SLOT_COUNT {
            let (x, z) = (index & 15, index >> 4);
            let actual = probe_top(probe, x, z, ceiling);
            if actual != self.tops[index] {
                tracing::warn!(
                    local_x = x,
                    local_z = z,
                    cached = self.tops[index],
                    actual,
                    "height map drifted from block data"
                );
                self.tops[index] = actual;
                repaired += 1;
            }
        }
        repaired
    }

    fn kind(&self) -> HeightMapKind {
        HeightMapKind::Minimal
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64Mcg;

    use super::*;
    use crate::height_map::test_support::OracleColumn;

    #[test]
    fn place_raise_and_remove_top() {
        let mut column = OracleColumn::new(0, 255);
        let mut map = ClientHeightMap::new();

        column.set(2, 10, 3, 15);
        map.on_opacity_change(2, 10, 3, 15, &column);
        assert_eq!(map.top_block_y(2, 3), 10);

        column.set(2, 20, 3, 15);
        map.on_opacity_change(2, 20, 3, 15, &column);
        assert_eq!(map.top_block_y(2, 3), 20);

        column.reset_probe_tracking();
        column.set(2, 20, 3, 0);
        map.on_opacity_change(2, 20, 3, 0, &column);
        assert_eq!(map.top_block_y(2, 3), 10);
        // The probe stops at the first opaque block.
        assert_eq!(column.lowest_probed(), Some(10));
    }

    #[test]
    fn removing_only_block_reports_no_height() {
        let mut column = OracleColumn::new(0, 255);
        let mut map = ClientHeightMap::new();

        column.set(0, 64, 0, 15);
        map.on_opacity_change(0, 64, 0, 15, &column);
        column.set(0, 64, 0, 0);
        map.on_opacity_change(0, 64, 0, 0, &column);

        assert_eq!(map.top_block_y(0, 0), NO_HEIGHT);
    }

    #[test]
    fn lowest_world_y_is_tracked() {
        let floor = i32::MIN + 16;
        let mut column = OracleColumn::new(floor, floor + 15);
        let mut map = ClientHeightMap::new();

        column.set(3, floor, 3, 15);
        map.on_opacity_change(3, floor, 3, 15, &column);
        assert_eq!(map.top_block_y(3, 3), floor);

        column.set(3, floor, 3, 0);
        map.on_opacity_change(3, floor, 3, 0, &column);
        assert_eq!(map.top_block_y(3, 3), NO_HEIGHT);

        // Clearing an empty slot at the sentinel itself leaves it empty.
        map.on_opacity_change(3, i32::MIN, 3, 0, &column);
        map.on_range_unloaded(i32::MIN, i32::MIN + 15, &column);
        assert_eq!(map.top_block_y(3, 3), NO_HEIGHT);
    }

    #[test]
    fn changes_below_top_are_ignored() {
        let mut column = OracleColumn::new(0, 255);
        let mut map = ClientHeightMap::new();
        column.set(4, 50, 4, 15);
        map.on_opacity_change(4, 50, 4, 15, &column);

        column.reset_probe_tracking();
        column.set(4, 30, 4, 15);
        map.on_opacity_change(4, 30, 4, 15, &column);
        column.set(4, 30, 4, 0);
        map.on_opacity_change(4, 30, 4, 0, &column);
        map.on_opacity_change(4, 60, 4, 0, &column);

        assert_eq!(map.top_block_y(4, 4), 50);
        assert_eq!(column.lowest_probed(), None);
    }

    #[test]
    fn unloading_range_reprobes_slots_inside_it() {
        let mut column = OracleColumn::new(0, 47);
        let mut map = ClientHeightMap::new();
        for (y, x) in [(5, 0), (40, 0), (20, 1)] {
            column.set(x, y, 0, 15);
            map.on_opacity_change(x, y, 0, 15, &column);
        }

        // Cube 2 (Y 32..=47) goes away.
        column.ceiling = 31;
        map.on_range_unloaded(32, 47, &column);

        assert_eq!(map.top_block_y(0, 0), 5);
        assert_eq!(map.top_block_y(1, 0), 20);
    }

    #[test]
    fn reconcile_repairs_missed_notifications() {
        let mut column = OracleColumn::new(0, 63);
        let mut map = ClientHeightMap::new();
        column.set(7, 12, 8, 15);
        map.on_opacity_change(7, 12, 8, 15, &column);

        // A write that never produced a notification.
        column.set(7, 33, 8, 15);
        column.set(1, 1, 1, 15);

        assert_eq!(map.reconcile(&column), 2);
        assert_eq!(map.top_block_y(7, 8), 33);
        assert_eq!(map.top_block_y(1, 1), 1);
        assert_eq!(map.reconcile(&column), 0);
    }

    #[test]
    fn matches_brute_force_oracle() {
        let mut rng = Pcg64Mcg::seed_from_u64(0x5eed);
        for _ in 0..64 {
            let mut column = OracleColumn::new(-64, 63);
            let mut map = ClientHeightMap::new();
            let (x, z) = (rng.random_range(0..16), rng.random_range(0..16));

            for _ in 0..200 {
                let y = rng.random_range(-64..64);
                let opacity = if rng.random_bool(0.5) {
                    rng.random_range(1..=15)
                } else {
                    0
                };
                column.set(x, y, z, opacity);
                map.on_opacity_change(x, y, z, opacity, &column);
                assert_eq!(map.top_block_y(x, z), column.top(x, z));
            }
        }
    }
}
