//! Room fan-out benchmarks for Parlor.
//!
//! Each iteration submits one broadcast and waits until the room has
//! placed it on every member's queue.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parlor_bench::join_sinks;
use parlor_core::{trace, Message, Room, RoomConfig, SlowConsumerPolicy};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime")
}

/// Benchmark fan-out to N members.
fn bench_fanout(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("fanout");

    for size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let config = RoomConfig {
                slow_consumer: SlowConsumerPolicy::Drop,
                ..RoomConfig::default()
            };
            let (room, _task) = rt.block_on(async { Room::spawn(config, trace::off()) });
            let (_members, _drains) = rt.block_on(join_sinks(&room, size, 1024));
            let message = Message::new("bench", "x".repeat(64));

            b.iter(|| {
                rt.block_on(async {
                    room.broadcast(black_box(message.clone())).await.unwrap();
                    room.stats().await.unwrap()
                })
            });
        });
    }

    group.finish();
}

/// Benchmark join and leave through the command queue.
fn bench_membership(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("membership");

    group.bench_function("join_leave", |b| {
        let (room, _task) = rt.block_on(async { Room::spawn(RoomConfig::default(), trace::off()) });
        b.iter(|| {
            rt.block_on(async {
                let mut client = parlor_core::Client::new(parlor_core::Profile::new(), 1);
                let membership = room.join(&mut client).await.unwrap();
                membership.leave().await.unwrap();
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fanout, bench_membership);
criterion_main!(benches);
