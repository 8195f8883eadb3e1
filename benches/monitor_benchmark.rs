use criterion::{black_box, criterion_group, criterion_main, Criterion};
use smm_panel_monitor::monitoring::FixedMemoryProbe;
use smm_panel_monitor::{MonitorConfig, OperationMonitor};
use std::sync::Arc;

fn create_monitor(max_concurrency: usize) -> OperationMonitor {
    let config = MonitorConfig {
        max_concurrency,
        ..MonitorConfig::default()
    };
    OperationMonitor::with_memory_probe(config, Arc::new(FixedMemoryProbe::with_ratio(0.2)))
}

fn bench_admit_complete(c: &mut Criterion) {
    let monitor = create_monitor(50);
    let ids: Vec<String> = (0..50).map(|i| format!("op-{}", i)).collect();

    c.bench_function("admit_complete_50", |b| {
        b.iter(|| {
            for id in &ids {
                black_box(monitor.try_admit(id, "bulk-order-sync", 10));
            }
            for id in &ids {
                monitor.complete(id, 10);
            }
        })
    });
}

fn bench_rejection(c: &mut Criterion) {
    let monitor = create_monitor(1);
    monitor.try_admit("holder", "bulk-order-sync", 1);

    c.bench_function("reject_at_ceiling", |b| {
        b.iter(|| black_box(monitor.try_admit("extra", "bulk-order-sync", 1)))
    });
}

fn bench_health(c: &mut Criterion) {
    let monitor = create_monitor(50);
    for i in 0..40 {
        monitor.try_admit(&format!("op-{}", i), "bulk-order-sync", 10);
    }

    c.bench_function("health_40_active", |b| b.iter(|| black_box(monitor.health())));
}

criterion_group!(benches, bench_admit_complete, bench_rejection, bench_health);
criterion_main!(benches);
