use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

use sfu_track_listener::testing::{FakeLocalTrack, FakeRemoteTrack, FakeSession};
use sfu_track_listener::{ClientId, LoggerFactory, TracingLoggerFactory, TrackListener};

// Simulates the hot path: one remote track delivering MTU-sized packets
// through a listener with an already-draining Router on the other end of
// `events`.
fn bench_forwarding_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let factory = TracingLoggerFactory;

    c.bench_function("forward_1400_byte_packet", |b| {
        b.to_async(&rt).iter(|| async {
            let session = Arc::new(FakeSession::new());
            let listener = TrackListener::new(&factory, ClientId::from("pub1"), session.clone());
            let mut events = listener.events().await.unwrap();

            let remote = FakeRemoteTrack::new("vid", "stream-A", 96, 1, "video");
            let packet_tx = remote.sender();
            session.push_remote_track(remote).await;

            let _ = events.recv().await;
            packet_tx.send(vec![0u8; 1400]).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_micros(200)).await;

            listener.close().await;
        })
    });
}

// Measures the cost of attaching/detaching a caller-supplied track,
// independent of the inbound-track hot path.
fn bench_add_remove_track(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let factory = TracingLoggerFactory;

    c.bench_function("add_remove_track", |b| {
        b.to_async(&rt).iter(|| async {
            let session = Arc::new(FakeSession::new());
            let listener = TrackListener::new(&factory, ClientId::from("pub1"), session.clone());
            let track = FakeLocalTrack::new("t1");

            listener.add_track(track.clone()).await.unwrap();
            listener.remove_track(&track).await.unwrap();
        })
    });
}

// Cheap-clone check for the `ClientId` newtype, mirroring the teacher's
// own `id_benchmark.rs` comparison of `String` clone cost vs `Arc`-backed
// strong-id clone cost.
fn bench_client_id_clone(c: &mut Criterion) {
    let id = ClientId::from("some-long-publisher-id-1234567890");
    c.bench_function("clone_client_id", |b| {
        b.iter(|| {
            let _ = id.clone();
        })
    });
}

criterion_group!(
    benches,
    bench_forwarding_throughput,
    bench_add_remove_track,
    bench_client_id_clone
);
criterion_main!(benches);
