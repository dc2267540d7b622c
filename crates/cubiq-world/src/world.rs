//! World-level cache of virtualized columns.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use cubiq_core::config::WorldConfig;
use cubiq_core::coords::{BlockPos, ColumnPos, CubePos};
use cubiq_core::error::{Error, Result};
use cubiq_core::types::{BlockId, OpacityTable};

use crate::column::CubicColumn;
use crate::cube::Cube;
use crate::queue::BatchedQueue;

/// All loaded columns of a cubic world.
///
/// Each column has its own locks; the column map is only locked to find or
/// insert a column.
pub struct CubicWorld {
    config: Arc<WorldConfig>,
    opacity: Arc<OpacityTable>,
    columns: RwLock<HashMap<ColumnPos, Arc<CubicColumn>>>,
    unload_queue: Mutex<BatchedQueue<CubePos>>,
}

impl CubicWorld {
    /// Create an empty world. The configuration must describe cubic columns.
    pub fn new(config: WorldConfig, opacity: OpacityTable) -> Result<Self> {
        config.validate()?;
        if !config.cubic {
            return Err(Error::InvalidConfig(
                "a cubic world needs cubic columns".to_owned(),
            ));
        }
        tracing::debug!(
            min_height = config.min_height,
            max_height = config.max_height,
            authority = ?config.authority,
            "created cubic world"
        );
        Ok(Self {
            config: Arc::new(config),
            opacity: Arc::new(opacity),
            columns: RwLock::new(HashMap::new()),
            unload_queue: Mutex::new(BatchedQueue::new()),
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn opacity(&self) -> &OpacityTable {
        &self.opacity
    }

    /// Get the column at `pos`, creating an empty one if needed.
    pub fn column_or_create(&self, pos: ColumnPos) -> Arc<CubicColumn> {
        if let Some(column) = self.columns.read().get(&pos) {
            return Arc::clone(column);
        }
        let mut columns = self.columns.write();
        let column = columns.entry(pos).or_insert_with(|| {
            tracing::debug!(column = %pos, "created column");
            Arc::new(CubicColumn::new(
                pos,
                Arc::clone(&self.config),
                Arc::clone(&self.opacity),
            ))
        });
        Arc::clone(column)
    }

    pub fn column(&self, pos: ColumnPos) -> Option<Arc<CubicColumn>> {
        self.columns.read().get(&pos).cloned()
    }

    /// Get the cube at `pos`, creating its column and the cube if needed.
    pub fn cube_or_create(&self, pos: CubePos) -> Result<Arc<Cube>> {
        self.column_or_create(pos.column_pos())
            .cubes()
            .get_or_create(pos.y)
    }

    /// Get the cube at `pos` if it is resident.
    pub fn loaded_cube(&self, pos: CubePos) -> Option<Arc<Cube>> {
        self.column(pos.column_pos())?
            .cubes()
            .get(pos.y)
            .ok()
            .flatten()
    }

    /// Block at a world position; unloaded columns read as air.
    pub fn block(&self, pos: BlockPos) -> Result<BlockId> {
        match self.column(pos.column_pos()) {
            Some(column) => column.block(pos),
            None => Ok(BlockId::AIR),
        }
    }

    /// Write a block, creating its column and cube if needed.
    pub fn set_block(&self, pos: BlockPos, block: BlockId) -> Result<BlockId> {
        self.column_or_create(pos.column_pos()).set_block(pos, block)
    }

    /// Schedule a cube for eviction. Returns false if it was already queued.
    pub fn queue_unload(&self, pos: CubePos) -> bool {
        self.unload_queue.lock().push(pos)
    }

    pub fn pending_unloads(&self) -> usize {
        self.unload_queue.lock().len()
    }

    /// Evict up to `batch` queued cubes and return the ones that were resident.
    pub fn process_unload_queue(&self, batch: usize) -> Vec<Arc<Cube>> {
        let positions = self.unload_queue.lock().drain_batch(batch);
        let evicted: Vec<_> = positions
            .into_iter()
            .filter_map(|pos| self.column(pos.column_pos())?.unload_cube(pos.y))
            .collect();
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "evicted cubes");
        }
        evicted
    }

    /// Drop columns without resident cubes, returning their positions.
    ///
    /// A column still referenced outside the world is kept, so writes made
    /// through a handle from [`CubicWorld::column_or_create`] are never
    /// orphaned. Handles are only cloned under the map lock, which is held
    /// here, so the reference count cannot grow while a column is checked.
    pub fn unload_empty_columns(&self) -> Vec<ColumnPos> {
        let mut columns = self.columns.write();
        let empty: Vec<_> = columns
            .iter()
            .filter(|(_, column)| Arc::strong_count(column) == 1 && column.cubes().is_empty())
            .map(|(pos, _)| *pos)
            .collect();
        for pos in &empty {
            columns.remove(pos);
        }
        if !empty.is_empty() {
            tracing::debug!(count = empty.len(), "dropped empty columns");
        }
        empty
    }

    /// Run `f` on every cube holding blocks, with columns processed in parallel.
    ///
    /// Cubes of one column are visited in ascending Y order on one thread.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn tick_columns<F>(&self, f: F)
    where
        F: Fn(&CubicColumn, &Cube) + Sync,
    {
        let columns: Vec<_> = self.columns.read().values().cloned().collect();
        columns.par_iter().for_each(|column| {
            for cube in column.storages_to_tick() {
                f(column, &cube);
            }
        });
    }

    pub fn column_count(&self) -> usize {
        self.columns.read().len()
    }

    /// Number of resident cubes across all columns.
    pub fn cube_count(&self) -> usize {
        self.columns
            .read()
            .values()
            .map(|column| column.cubes().len())
            .sum()
    }
}

impl std::fmt::Debug for CubicWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CubicWorld")
            .field("columns", &self.column_count())
            .field("cubes", &self.cube_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn world() -> CubicWorld {
        CubicWorld::new(WorldConfig::default(), OpacityTable::default()).unwrap()
    }

    #[test]
    fn legacy_config_is_rejected() {
        let err = CubicWorld::new(WorldConfig::legacy(), OpacityTable::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn blocks_route_to_columns() {
        let world = world();
        let pos = BlockPos::new(-20, 1000, 35);
        assert_eq!(world.block(pos).unwrap(), BlockId::AIR);
        assert_eq!(world.column_count(), 0);

        world.set_block(pos, BlockId::STONE).unwrap();
        assert_eq!(world.block(pos).unwrap(), BlockId::STONE);
        assert_eq!(world.column_count(), 1);
        assert_eq!(world.cube_count(), 1);

        let column = world.column(ColumnPos::new(-2, 2)).unwrap();
        assert_eq!(column.top_block_y(12, 3), 1000);
        assert!(world.loaded_cube(pos.cube_pos()).is_some());
    }

    #[test]
    fn same_column_is_shared() {
        let world = world();
        let a = world.column_or_create(ColumnPos::new(1, 1));
        let b = world.column_or_create(ColumnPos::new(1, 1));
        assert!(Arc::ptr_eq(&a, &b));
        let cube = world.cube_or_create(CubePos::new(1, -4, 1)).unwrap();
        assert!(Arc::ptr_eq(&cube, &a.cubes().get(-4).unwrap().unwrap()));
    }

    #[test]
    fn unload_queue_evicts_in_batches() {
        let world = world();
        for y in 0..4 {
            world.set_block(BlockPos::new(0, y * 16, 0), BlockId::DIRT).unwrap();
            assert!(world.queue_unload(CubePos::new(0, y, 0)));
        }
        assert!(!world.queue_unload(CubePos::new(0, 0, 0)));
        assert!(world.queue_unload(CubePos::new(9, 9, 9)));
        assert_eq!(world.pending_unloads(), 5);

        let first = world.process_unload_queue(3);
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|cube| !cube.is_loaded()));

        // The last batch holds one resident cube and one that never existed.
        assert_eq!(world.process_unload_queue(10).len(), 1);
        assert_eq!(world.cube_count(), 0);
        assert_eq!(world.unload_empty_columns(), vec![ColumnPos::new(0, 0)]);
        assert_eq!(world.column_count(), 0);
    }

    #[test]
    fn held_columns_survive_empty_column_sweep() {
        let world = world();
        let pos = BlockPos::new(40, 7, -3);
        let column = world.column_or_create(pos.column_pos());
        assert!(world.unload_empty_columns().is_empty());

        column.set_block(pos, BlockId::STONE).unwrap();
        assert_eq!(world.block(pos).unwrap(), BlockId::STONE);
        assert!(Arc::ptr_eq(&column, &world.column(pos.column_pos()).unwrap()));

        // Once released and emptied the column can go.
        column.set_block(pos, BlockId::AIR).unwrap();
        column.unload_cube(pos.cube_pos().y).unwrap();
        drop(column);
        assert_eq!(world.unload_empty_columns(), vec![pos.column_pos()]);
        assert_eq!(world.block(pos).unwrap(), BlockId::AIR);
    }

    #[test]
    fn sweeping_while_writing_loses_nothing() {
        let world = world();
        std::thread::scope(|scope| {
            let world = &world;
            scope.spawn(move || {
                for _ in 0..200 {
                    world.unload_empty_columns();
                }
            });
            for x in 0..4 {
                scope.spawn(move || {
                    for y in 0..50 {
                        world.set_block(BlockPos::new(x * 16, y, 0), BlockId::DIRT).unwrap();
                    }
                });
            }
        });
        for x in 0..4 {
            for y in 0..50 {
                assert_eq!(world.block(BlockPos::new(x * 16, y, 0)).unwrap(), BlockId::DIRT);
            }
        }
    }

    #[test]
    fn tick_visits_populated_cubes() {
        let world = world();
        for x in 0..8 {
            world.set_block(BlockPos::new(x * 16, 0, 0), BlockId::STONE).unwrap();
            world.set_block(BlockPos::new(x * 16, 40, 0), BlockId::STONE).unwrap();
        }
        world.cube_or_create(CubePos::new(0, 9, 0)).unwrap();

        let visited = AtomicUsize::new(0);
        world.tick_columns(|column, cube| {
            assert_eq!(cube.pos().column_pos(), column.pos());
            visited.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(visited.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn concurrent_writers_in_different_columns() {
        let world = world();
        std::thread::scope(|scope| {
            for x in 0..8 {
                let world = &world;
                scope.spawn(move || {
                    for y in 0..64 {
                        world.set_block(BlockPos::new(x * 16, y, 0), BlockId::STONE).unwrap();
                    }
                });
            }
        });
        assert_eq!(world.column_count(), 8);
        for x in 0..8 {
            let column = world.column(ColumnPos::new(x, 0)).unwrap();
            assert_eq!(column.top_block_y(0, 0), 63);
        }
    }
}
