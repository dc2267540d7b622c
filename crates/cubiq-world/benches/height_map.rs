//! Height map update and column write benchmarks.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use cubiq_core::{Authority, BlockId, BlockPos, ColumnPos, OpacityTable, WorldConfig};
use cubiq_world::CubicColumn;

fn column(authority: Authority) -> CubicColumn {
    let config = WorldConfig {
        authority,
        ..Default::default()
    };
    CubicColumn::new(
        ColumnPos::new(0, 0),
        Arc::new(config),
        Arc::new(OpacityTable::default()),
    )
}

/// Fill a 16x16xH slab, then dig it out from the top.
fn fill_and_dig(column: &CubicColumn, height: i32) {
    for y in 0..height {
        for z in 0..16 {
            for x in 0..16 {
                column.set_block(BlockPos::new(x, y, z), BlockId::STONE).ok();
            }
        }
    }
    for y in (0..height).rev() {
        for z in 0..16 {
            for x in 0..16 {
                column.set_block(BlockPos::new(x, y, z), BlockId::AIR).ok();
            }
        }
    }
}

fn bench_fill_and_dig(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_and_dig");
    for authority in [Authority::Server, Authority::Client] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{authority:?}")),
            &authority,
            |b, &authority| {
                b.iter(|| {
                    let column = column(authority);
                    fill_and_dig(&column, 64);
                    black_box(column.top_block_y(0, 0))
                });
            },
        );
    }
    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let column = column(Authority::Client);
    for y in 0..128 {
        column.set_block(BlockPos::new(y % 16, y, 0), BlockId::STONE).ok();
    }
    c.bench_function("reconcile_128", |b| {
        b.iter(|| black_box(column.reconcile_heights()));
    });
}

criterion_group!(benches, bench_fill_and_dig, bench_reconcile);
criterion_main!(benches);
