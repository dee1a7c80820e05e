//! # Registry Benchmark
//!
//! The registry is tuned for tens to low hundreds of entities at interactive
//! frame rates. These numbers should stay far below one frame budget.
//!
//! Run with: `cargo bench --package regatta_core`

#![allow(missing_docs)]
#![allow(dead_code)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use regatta_core::{
    entity_value, AddOptions, EngineConfig, Entities, Entity, EventDispatcher, FrameContext,
    Session, Systems,
};

#[derive(Clone, Debug, PartialEq)]
struct Boat {
    x: f32,
    y: f32,
    speed: f32,
}

fn boat(i: usize) -> Entity<Boat> {
    #[allow(clippy::cast_precision_loss)]
    let x = i as f32;
    Entity::new(Boat {
        x,
        y: 0.0,
        speed: 1.0,
    })
}

fn populated(count: usize) -> Entities<Boat> {
    let entities = Entities::new();
    for i in 0..count {
        let group = if i % 2 == 0 { "fleet" } else { "buoys" };
        entities
            .add(boat(i), AddOptions::new().group(group))
            .unwrap();
    }
    entities
}

/// Benchmark: add then remove a batch of entities.
fn bench_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_remove");

    for count in [10, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let entities = populated(count);
                black_box(entities.remove(regatta_core::RemoveSelector::groups(["fleet", "buoys"])))
            });
        });
    }

    group.finish();
}

/// Benchmark: group lookup.
fn bench_get_by_group(c: &mut Criterion) {
    let entities = populated(200);
    c.bench_function("get_by_group_200", |b| {
        b.iter(|| black_box(entities.get_by_group("fleet").len()));
    });
}

/// Benchmark: one tick of a movement system over a fleet.
fn bench_systems_update(c: &mut Criterion) {
    let entities = populated(200);
    let ctx: FrameContext<()> = FrameContext::empty(Arc::new(EventDispatcher::new()));

    let mut systems: Systems<Boat, ()> = Systems::new();
    systems.add(|entities: &Entities<Boat>, _: &FrameContext<()>| {
        for entity in entities.get_by_group("fleet") {
            entities.modify(entity.id(), |b| Boat {
                x: b.x + b.speed,
                ..b.clone()
            });
        }
    });

    c.bench_function("systems_update_200", |b| {
        b.iter(|| black_box(systems.update(&entities, &ctx)));
    });
}

/// Benchmark: frame advance with memos attached.
fn bench_memo_frame(c: &mut Criterion) {
    let session: Session<Boat, ()> = Session::new(EngineConfig::default()).unwrap();
    let ids: Vec<_> = (0..100)
        .map(|i| {
            session
                .entities()
                .add(boat(i), AddOptions::new())
                .unwrap()
                .id()
        })
        .collect();
    let memos: Vec<_> = ids
        .iter()
        .map(|id| session.memo(entity_value(*id, |b: &Boat| b.x, 0.0)).unwrap())
        .collect();

    c.bench_function("frame_advance_100_memos", |b| {
        b.iter(|| black_box(session.frames().update_frame(60.0, 16.7)));
    });

    drop(memos);
}

criterion_group!(
    benches,
    bench_add_remove,
    bench_get_by_group,
    bench_systems_update,
    bench_memo_frame
);
criterion_main!(benches);
