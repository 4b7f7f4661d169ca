//! Fan-out benchmarks for the hub.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use webchat_core::{
    chat, CallbackRegistry, ConnectionHandle, ConnectionId, HubConfig, HubEvent, HubRunner,
};

/// Process one chat frame with `n` connections registered.
fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");
    let frame = Bytes::from_static(br#"{"op": 2, "from": "bench", "message": "hello"}"#);

    for n in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut callbacks = CallbackRegistry::new();
            chat::install(&mut callbacks);
            let (mut runner, _hub) = HubRunner::new(HubConfig::default(), callbacks);

            let mut queues = Vec::with_capacity(n);
            for _ in 0..n {
                let (conn, outbound) = ConnectionHandle::new(ConnectionId::next(), None, 256);
                runner.process(HubEvent::Register(conn));
                queues.push(outbound);
            }
            let sender = runner.hub().connection_ids()[0];

            b.iter(|| {
                runner.process(HubEvent::Inbound {
                    from: sender,
                    frame: black_box(frame.clone()),
                });
                for queue in &mut queues {
                    while queue.try_recv().is_some() {}
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_broadcast);
criterion_main!(benches);
