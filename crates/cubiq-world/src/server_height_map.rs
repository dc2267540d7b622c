//! Full height map that remembers every opaque block of a column.

use std::collections::BTreeMap;

use cubiq_core::constants::NO_HEIGHT;

use crate::height_map::{
    candidate_ys, slot_index, HeightMap, HeightMapKind, OpacityProbe, SLOT_COUNT,
};

/// Run of vertically adjacent blocks sharing one opacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Run {
    /// Highest Y of the run, inclusive.
    end: i32,
    opacity: u8,
}

/// Opaque blocks of one slot as maximal runs keyed by their lowest Y.
///
/// Runs never overlap, and two touching runs always differ in opacity.
#[derive(Clone, Debug, Default)]
struct Slot {
    runs: BTreeMap<i32, Run>,
}

impl Slot {
    fn top(&self) -> i32 {
        self.runs.last_key_value().map_or(NO_HEIGHT, |(_, run)| run.end)
    }

    fn top_below(&self, y: i32) -> i32 {
        self.runs
            .range(..y)
            .next_back()
            .map_or(NO_HEIGHT, |(_, run)| run.end.min(y - 1))
    }

    fn opacity_above(&self, y: i32) -> u64 {
        let Some(low) = y.checked_add(1) else {
            return 0;
        };
        self.runs
            .iter()
            .rev()
            .take_while(|(_, run)| run.end >= low)
            .map(|(&start, run)| {
                let len = i64::from(run.end) - i64::from(start.max(low)) + 1;
                len.unsigned_abs() * u64::from(run.opacity)
            })
            .sum()
    }

    fn block_count(&self) -> u64 {
        self.runs
            .iter()
            .map(|(&start, run)| (i64::from(run.end) - i64::from(start) + 1).unsigned_abs())
            .sum()
    }

    /// Runs overlapping `low..=high`, clipped to it, as `(start, end, opacity)`.
    fn runs_within(&self, low: i32, high: i32) -> Vec<(i32, i32, u8)> {
        let mut runs: Vec<_> = self
            .runs
            .range(..=high)
            .rev()
            .take_while(|(_, run)| run.end >= low)
            .map(|(&start, run)| (start.max(low), run.end.min(high), run.opacity))
            .collect();
        runs.reverse();
        runs
    }

    /// Split the run crossing `at`, if any, so that a run starts at `at`.
    fn split_at(&mut self, at: i32) {
        let Some((&start, &run)) = self.runs.range(..at).next_back() else {
            return;
        };
        if run.end >= at {
            self.runs.insert(start, Run { end: at - 1, ..run });
            self.runs.insert(at, run);
        }
    }

    /// Set every block of `low..=high` to `opacity`; zero clears them.
    fn assign(&mut self, low: i32, high: i32, opacity: u8) {
        self.split_at(low);
        if let Some(above) = high.checked_add(1) {
            self.split_at(above);
        }
        let covered: Vec<i32> = self.runs.range(low..=high).map(|(start, _)| *start).collect();
        for start in covered {
            self.runs.remove(&start);
        }
        if opacity == 0 {
            return;
        }

        let mut start = low;
        let mut end = high;
        if let Some((&prev, run)) = self.runs.range(..low).next_back() {
            if run.end == low - 1 && run.opacity == opacity {
                start = prev;
            }
        }
        if let Some(next) = high.checked_add(1) {
            if let Some(run) = self.runs.get(&next).copied() {
                if run.opacity == opacity {
                    self.runs.remove(&next);
                    end = run.end;
                }
            }
        }
        self.runs.insert(start, Run { end, opacity });
    }
}

/// Authoritative opacity index for columns that own simulation.
///
/// Each slot keeps the opacity of every opaque block reported to it, stored
/// as runs of equal opacity, which also answers how much opacity lies above
/// a given height. The data stays valid when cubes unload; only
/// [`HeightMap::reconcile`] rewrites it, and only within loaded ranges.
#[derive(Clone, Debug)]
pub struct ServerHeightMap {
    slots: Vec<Slot>,
}

impl Default for ServerHeightMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerHeightMap {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::default(); SLOT_COUNT],
        }
    }

    fn slot(&self, local_x: usize, local_z: usize) -> &Slot {
        &self.slots[slot_index(local_x, local_z)]
    }

    /// Number of opaque blocks tracked for a slot.
    pub fn opaque_count(&self, local_x: usize, local_z: usize) -> u64 {
        self.slot(local_x, local_z).block_count()
    }

    /// Number of stored runs for a slot.
    pub fn run_count(&self, local_x: usize, local_z: usize) -> usize {
        self.slot(local_x, local_z).runs.len()
    }
}

/// Opaque runs found in `low..=high`, ascending.
fn scan_runs(
    probe: &dyn OpacityProbe,
    local_x: usize,
    local_z: usize,
    low: i32,
    high: i32,
) -> Vec<(i32, i32, u8)> {
    let mut runs: Vec<(i32, i32, u8)> = Vec::new();
    for y in candidate_ys(probe, high, low) {
        let opacity = probe.opacity_at(local_x, y, local_z);
        if opacity == 0 {
            continue;
        }
        match runs.last_mut() {
            Some((start, _, last)) if *last == opacity && *start == y + 1 => *start = y,
            _ => runs.push((y, y, opacity)),
        }
    }
    runs.reverse();
    runs
}

impl HeightMap for ServerHeightMap {
    fn on_opacity_change(
        &mut self,
        local_x: usize,
        block_y: i32,
        local_z: usize,
        opacity: u8,
        _probe: &dyn OpacityProbe,
    ) {
        self.slots[slot_index(local_x, local_z)].assign(block_y, block_y, opacity);
    }

    #[inline]
    fn top_block_y(&self, local_x: usize, local_z: usize) -> i32 {
        self.slot(local_x, local_z).top()
    }

    fn on_range_unloaded(&mut self, _min_y: i32, _max_y: i32, _probe: &dyn OpacityProbe) {}

    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    fn reconcile(&mut self, probe: &dyn OpacityProbe) -> usize {
        let loaded = probe.loaded_ranges();
        let mut repaired = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let (x, z) = (index & 15, index >> 4);
            let mut drifted = false;
            for range in &loaded {
                let (low, high) = (*range.start(), *range.end());
                let actual = scan_runs(probe, x, z, low, high);
                let cached = slot.runs_within(low, high);
                if actual == cached {
                    continue;
                }
                tracing::warn!(
                    local_x = x,
                    local_z = z,
                    low,
                    high,
                    cached = cached.len(),
                    actual = actual.len(),
                    "opacity index drifted from block data"
                );
                slot.assign(low, high, 0);
                for (start, end, opacity) in actual {
                    slot.assign(start, end, opacity);
                }
                drifted = true;
            }
            repaired += usize::from(drifted);
        }
        repaired
    }

    fn kind(&self) -> HeightMapKind {
        HeightMapKind::Full
    }

    fn top_block_y_below(&self, local_x: usize, local_z: usize, y: i32) -> Option<i32> {
        Some(self.slot(local_x, local_z).top_below(y))
    }

    fn opacity_above(&self, local_x: usize, y: i32, local_z: usize) -> Option<u64> {
        Some(self.slot(local_x, local_z).opacity_above(y))
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64Mcg;

    use super::*;
    use crate::height_map::test_support::OracleColumn;

    #[test]
    fn tracks_every_opaque_block() {
        let probe = OracleColumn::new(0, 255);
        let mut map = ServerHeightMap::new();

        map.on_opacity_change(2, 10, 3, 15, &probe);
        assert_eq!(map.top_block_y(2, 3), 10);
        map.on_opacity_change(2, 20, 3, 15, &probe);
        assert_eq!(map.top_block_y(2, 3), 20);
        map.on_opacity_change(2, 20, 3, 0, &probe);
        assert_eq!(map.top_block_y(2, 3), 10);
        map.on_opacity_change(2, 10, 3, 0, &probe);
        assert_eq!(map.top_block_y(2, 3), NO_HEIGHT);
    }

    #[test]
    fn opacity_above_and_top_below() {
        let probe = OracleColumn::new(0, 255);
        let mut map = ServerHeightMap::new();
        map.on_opacity_change(0, 5, 0, 15, &probe);
        map.on_opacity_change(0, 8, 0, 1, &probe);
        map.on_opacity_change(0, 9, 0, 3, &probe);

        assert_eq!(map.opacity_above(0, 4, 0), Some(19));
        assert_eq!(map.opacity_above(0, 8, 0), Some(3));
        assert_eq!(map.opacity_above(0, 9, 0), Some(0));
        assert_eq!(map.opacity_above(0, i32::MAX, 0), Some(0));
        assert_eq!(map.top_block_y_below(0, 0, 9), Some(8));
        assert_eq!(map.top_block_y_below(0, 0, 5), Some(NO_HEIGHT));
        assert_eq!(map.opaque_count(0, 0), 3);
    }

    #[test]
    fn solid_fill_is_one_run() {
        let probe = OracleColumn::new(0, 255);
        let mut map = ServerHeightMap::new();
        for y in (0..256).rev() {
            map.on_opacity_change(6, y, 6, 15, &probe);
        }
        assert_eq!(map.run_count(6, 6), 1);
        assert_eq!(map.opaque_count(6, 6), 256);
        assert_eq!(map.opacity_above(6, 250, 6), Some(5 * 15));
        assert_eq!(map.top_block_y_below(6, 6, 100), Some(99));

        // Digging a hole splits the run, filling it merges it back.
        map.on_opacity_change(6, 100, 6, 0, &probe);
        assert_eq!(map.run_count(6, 6), 2);
        assert_eq!(map.top_block_y_below(6, 6, 101), Some(99));
        map.on_opacity_change(6, 100, 6, 2, &probe);
        assert_eq!(map.run_count(6, 6), 3);
        map.on_opacity_change(6, 100, 6, 15, &probe);
        assert_eq!(map.run_count(6, 6), 1);
        assert_eq!(map.top_block_y(6, 6), 255);
    }

    #[test]
    fn unloading_keeps_data() {
        let probe = OracleColumn::new(0, 15);
        let mut map = ServerHeightMap::new();
        map.on_opacity_change(1, 100, 1, 15, &probe);
        map.on_range_unloaded(96, 111, &probe);
        assert_eq!(map.top_block_y(1, 1), 100);
    }

    #[test]
    fn reconcile_only_touches_loaded_range() {
        let mut column = OracleColumn::new(0, 31);
        let mut map = ServerHeightMap::new();
        // Known block above the loaded range survives reconciliation.
        map.on_opacity_change(3, 200, 3, 15, &column);
        // Stale entry inside the loaded range.
        map.on_opacity_change(3, 10, 3, 15, &column);
        column.set(3, 12, 3, 2);

        assert_eq!(map.reconcile(&column), 1);
        assert_eq!(map.top_block_y(3, 3), 200);
        assert_eq!(map.top_block_y_below(3, 3, 200), Some(12));
        assert_eq!(map.opaque_count(3, 3), 2);
        assert_eq!(map.reconcile(&column), 0);
    }

    #[test]
    fn reconcile_keeps_runs_crossing_the_loaded_range() {
        let mut column = OracleColumn::new(16, 31);
        let mut map = ServerHeightMap::new();
        for y in 0..48 {
            map.on_opacity_change(0, y, 0, 15, &column);
            if (16..32).contains(&y) {
                column.set(0, y, 0, 15);
            }
        }
        assert_eq!(map.reconcile(&column), 0);

        column.set(0, 20, 0, 0);
        assert_eq!(map.reconcile(&column), 1);
        assert_eq!(map.opaque_count(0, 0), 47);
        assert_eq!(map.run_count(0, 0), 2);
        assert_eq!(map.top_block_y_below(0, 0, 21), Some(19));
    }

    #[test]
    fn matches_brute_force_oracle() {
        let mut rng = Pcg64Mcg::seed_from_u64(0xc0be);
        let mut column = OracleColumn::new(-256, 255);
        let mut map = ServerHeightMap::new();

        for _ in 0..2000 {
            let (x, z) = (rng.random_range(0..4), rng.random_range(0..4));
            let y = rng.random_range(-256..256);
            let opacity = if rng.random_bool(0.4) {
                rng.random_range(1..=15)
            } else {
                0
            };
            column.set(x, y, z, opacity);
            map.on_opacity_change(x, y, z, opacity, &column);
            assert_eq!(map.top_block_y(x, z), column.top(x, z));

            let query_y = rng.random_range(-256..256);
            let expected: u64 = (query_y + 1..256)
                .map(|above| u64::from(column.opacity_at(x, above, z)))
                .sum();
            assert_eq!(map.opacity_above(x, query_y, z), Some(expected));
        }
        assert_eq!(map.reconcile(&column), 0);
    }
}
