//! Latency benchmarks for Parlor.
//!
//! These benchmarks measure a message's trip through the client pumps and
//! the room over the in-memory transport.

use criterion::{criterion_group, criterion_main, Criterion};
use parlor_core::{trace, AuthAvatar, Client, Profile, Room, RoomConfig};
use parlor_transport::memory::{self, MemoryPeer};
use parlor_transport::{serve_client, PumpConfig};
use std::time::Instant;
use tokio::runtime::Runtime;

fn quiet() -> PumpConfig {
    PumpConfig {
        idle_timeout: None,
        ping_interval: None,
        ..PumpConfig::default()
    }
}

/// Start a room with `members` memory-transport clients.
fn setup(rt: &Runtime, members: usize) -> Vec<MemoryPeer> {
    rt.block_on(async {
        let (room, _task) = Room::spawn(RoomConfig::default(), trace::off());
        let mut peers = Vec::with_capacity(members);
        for i in 0..members {
            let (conn, peer) = memory::pair(256);
            let room = room.clone();
            tokio::spawn(async move {
                let client = Client::new(Profile::new().with("name", format!("peer-{i}")), 256);
                let _ = serve_client(conn, client, &room, &AuthAvatar, quiet()).await;
            });
            peers.push(peer);
        }
        while room.stats().await.map(|s| s.members).unwrap_or(0) < members {
            tokio::task::yield_now().await;
        }
        peers
    })
}

/// Benchmark one client's message echoed back to it.
fn bench_echo_latency(c: &mut Criterion) {
    let rt = Runtime::new().expect("failed to build runtime");
    let mut group = c.benchmark_group("pump_latency");

    group.bench_function("echo", |b| {
        let mut peers = setup(&rt, 1);
        let peer = &mut peers[0];
        b.iter_custom(|iters| {
            rt.block_on(async {
                let start = Instant::now();
                for _ in 0..iters {
                    peer.send_text(r#"{"message":"ping"}"#).await.unwrap();
                    peer.next_frame().await.unwrap();
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("ten_members", |b| {
        let mut peers = setup(&rt, 10);
        b.iter_custom(|iters| {
            rt.block_on(async {
                let start = Instant::now();
                for _ in 0..iters {
                    peers[0].send_text(r#"{"message":"ping"}"#).await.unwrap();
                    for peer in peers.iter_mut() {
                        peer.next_frame().await.unwrap();
                    }
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_echo_latency);
criterion_main!(benches);
