// Benchmarks for the derived-data passes that run on every world edit:
// redstone re-propagation, fog-of-war solving, and shading.
//
// The grid is a 32x32 comb of redstone wire fed by pressure plates, with
// scattered torches and stone so fog and shading have work to do.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tilecraft_sim::block::LevelBlock;
use tilecraft_sim::fog::solve_fow_type_for_map;
use tilecraft_sim::plane::{LevelPlane, PlaneType};
use tilecraft_sim::shading::compute_shading;
use tilecraft_sim::types::Position;

const SIZE: i32 = 32;

fn action_tags() -> Vec<String> {
    let mut tags = Vec::with_capacity((SIZE * SIZE) as usize);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let tag = if y % 4 == 0 && x == 0 {
                "pressurePlateDown"
            } else if y % 4 == 0 || x % 8 == 4 {
                "redstoneWire"
            } else if (x * 7 + y * 3) % 23 == 0 {
                "torch"
            } else if (x + y) % 5 == 0 {
                "stone"
            } else {
                ""
            };
            tags.push(tag.to_string());
        }
    }
    tags
}

fn ground_tags() -> Vec<String> {
    (0..SIZE * SIZE)
        .map(|i| if i % 37 == 0 { "water" } else { "grass" }.to_string())
        .collect()
}

fn redstone_refresh(c: &mut Criterion) {
    let mut plane = LevelPlane::new(PlaneType::Action, SIZE, SIZE, &action_tags());
    c.bench_function("redstone_refresh_32x32", |b| {
        b.iter(|| {
            plane.refresh_redstone();
            black_box(plane.take_notices());
        })
    });
}

fn toggle_battery(c: &mut Criterion) {
    let mut plane = LevelPlane::new(PlaneType::Action, SIZE, SIZE, &action_tags());
    let plate = Position::new(0, 0);
    let mut down = true;
    c.bench_function("toggle_pressure_plate_32x32", |b| {
        b.iter(|| {
            down = !down;
            let tag = if down { "pressurePlateDown" } else { "pressurePlateUp" };
            plane.set_block_at(plate, LevelBlock::new(tag));
            black_box(plane.take_notices());
        })
    });
}

fn fog_and_shading(c: &mut Criterion) {
    let action = LevelPlane::new(PlaneType::Action, SIZE, SIZE, &action_tags());
    let ground = LevelPlane::new(PlaneType::Ground, SIZE, SIZE, &ground_tags());
    c.bench_function("fog_map_32x32", |b| {
        b.iter(|| black_box(solve_fow_type_for_map(&action, &ground)))
    });
    c.bench_function("shading_32x32", |b| b.iter(|| black_box(compute_shading(&action))));
}

criterion_group!(benches, redstone_refresh, toggle_battery, fog_and_shading);
criterion_main!(benches);
