//! Cubiq walkthrough: builds a small cubic world, edits it, and evicts cubes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use cubiq_core::coords::LocalPos;
use cubiq_core::{BlockId, BlockPos, ColumnPos, CubePos, OpacityTable, WorldConfig};
use cubiq_voxel::{ArrayStorage, BlockStorage};
use cubiq_world::{AnyColumn, CubicWorld};
use glam::DVec3;
use tracing::info;
use tracing_subscriber::EnvFilter;

const RADIUS: i32 = 2;

/// Rolling terrain height for a block column.
fn terrain_height(x: i32, z: i32) -> i32 {
    48 + ((x * 7 + z * 13).rem_euclid(29)) - 14
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let world = CubicWorld::new(WorldConfig::default(), OpacityTable::default())?;

    for cx in -RADIUS..RADIUS {
        for cz in -RADIUS..RADIUS {
            for lz in 0..16 {
                for lx in 0..16 {
                    let (x, z) = (cx * 16 + lx, cz * 16 + lz);
                    let surface = terrain_height(x, z);
                    for y in -32..=surface {
                        let block = if y == surface {
                            BlockId::GRASS
                        } else {
                            BlockId::STONE
                        };
                        world.set_block(BlockPos::new(x, y, z), block)?;
                    }
                }
            }
        }
    }
    info!(
        columns = world.column_count(),
        cubes = world.cube_count(),
        "generated terrain"
    );

    let origin = world
        .column(ColumnPos::new(0, 0))
        .context("origin column was not generated")?;
    info!(
        top = origin.top_block_y(0, 0),
        segment = origin.top_filled_segment(),
        "origin column surface"
    );

    // Dig a shaft and watch the surface follow it down.
    for y in (10..=terrain_height(4, 4)).rev() {
        origin.set_block(BlockPos::new(4, y, 4), BlockId::AIR)?;
    }
    info!(
        top = origin.top_block_y(4, 4),
        below = ?origin.top_block_y_below(4, 4, 10),
        shade = ?origin.opacity_above(5, 0, 5),
        "shaft dug at (4, 4)"
    );

    // Floating cube: prime, fill, commit.
    let primed = origin.prime_cube(20)?;
    let mut storage = ArrayStorage::new(CubePos::new(0, 20, 0).min_block().y, true);
    storage.set(LocalPos::new(8, 8, 8), BlockId::GLASS);
    storage.set(LocalPos::new(8, 0, 8), BlockId::STONE);
    primed.set_storage(storage)?;
    let island = origin.commit_cube(primed)?;
    info!(pos = %island.pos(), top = origin.top_block_y(8, 8), "committed floating cube");

    let mut entities = hecs::World::new();
    let player = entities.spawn(());
    let index = origin.add_entity(player, DVec3::new(8.5, 321.0, 8.5))?;
    info!(index, near = origin.entities_in_range(300, 340).len(), "player spawned");

    let ticked = AtomicUsize::new(0);
    world.tick_columns(|_, cube| {
        ticked.fetch_add(cube.non_air_count(), Ordering::Relaxed);
    });
    info!(blocks = ticked.load(Ordering::Relaxed), "ticked all columns");

    for column in [ColumnPos::new(-2, -2), ColumnPos::new(-1, -2)] {
        for y in -2..4 {
            world.queue_unload(column.cube(y));
        }
    }
    while world.pending_unloads() > 0 {
        let evicted = world.process_unload_queue(4);
        info!(evicted = evicted.len(), remaining = world.pending_unloads(), "unload batch");
    }
    info!(dropped = world.unload_empty_columns().len(), "dropped empty columns");
    info!(repaired = origin.reconcile_heights(), "reconciled origin heights");

    let legacy = AnyColumn::new(
        ColumnPos::new(0, 0),
        Arc::new(WorldConfig::legacy()),
        Arc::new(OpacityTable::default()),
    )?;
    legacy.set_block(BlockPos::new(0, 70, 0), BlockId::DIRT)?;
    let out_of_range = legacy.set_block(BlockPos::new(0, 300, 0), BlockId::DIRT);
    info!(
        cubic = legacy.is_cubic(),
        top = legacy.top_block_y(0, 0),
        rejected = out_of_range.is_err(),
        "legacy column"
    );

    Ok(())
}
