use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pulseboard_fanout::{
    Broadcaster, ConnectionGateway, ConnectionRegistry, DeliveryError, InMemoryRegistry,
};
use pulseboard_types::{Connection, ConnectionId, Event};
use std::sync::Arc;

#[derive(Debug)]
struct NullGateway;

#[async_trait]
impl ConnectionGateway for NullGateway {
    async fn post(&self, _connection_id: &ConnectionId, payload: &[u8]) -> Result<(), DeliveryError> {
        black_box(payload);
        Ok(())
    }
}

fn registry_with(connections: usize, rt: &tokio::runtime::Runtime) -> Arc<InMemoryRegistry> {
    let registry = Arc::new(InMemoryRegistry::new());
    rt.block_on(async {
        for i in 0..connections {
            let id = ConnectionId::new(format!("conn-{}", i));
            registry.put(Connection::new(id)).await.unwrap();
        }
    });
    registry
}

/// Benchmark one broadcast against registries of increasing size
fn bench_broadcast_varying_connections(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("broadcast_connections");
    let event = Event::new("cpu", "CPU Usage", 42.5, "%", "2024-01-01T00:00:00Z");

    for connections in [1, 10, 100, 1000].iter() {
        let registry = registry_with(*connections, &rt);
        let broadcaster = Broadcaster::new(registry, Arc::new(NullGateway));

        group.throughput(Throughput::Elements(*connections as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(connections),
            connections,
            |b, _| {
                b.to_async(&rt)
                    .iter(|| async { black_box(broadcaster.broadcast(black_box(&event)).await) });
            },
        );
    }
    group.finish();
}

/// Benchmark registry snapshots, taken once per broadcast
fn bench_registry_list_all(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("registry_list_all");

    for connections in [10, 1000].iter() {
        let registry = registry_with(*connections, &rt);
        group.bench_with_input(
            BenchmarkId::from_parameter(connections),
            connections,
            |b, _| {
                b.to_async(&rt)
                    .iter(|| async { black_box(registry.list_all().await.unwrap()) });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_broadcast_varying_connections,
    bench_registry_list_all
);
criterion_main!(benches);
