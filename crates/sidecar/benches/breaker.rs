//! Breaker hot-path benchmarks: the closed-state counter update and the
//! open-state fast rejection.

use argus_sidecar::breaker::Breaker;
use criterion::{Criterion, criterion_group, criterion_main};

fn bench_breaker(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let _guard = rt.enter();

    c.bench_function("breaker/closed_success", |b| {
        let breaker = Breaker::new("bench");
        b.iter(|| {
            let generation = breaker.acquire().unwrap();
            breaker.on_success(generation);
        })
    });

    c.bench_function("breaker/open_rejection", |b| {
        let breaker = Breaker::new("bench");
        for _ in 0..4 {
            let generation = breaker.acquire().unwrap();
            breaker.on_failure(generation);
        }
        b.iter(|| {
            let _ = breaker.acquire();
        })
    });
}

criterion_group!(benches, bench_breaker);
criterion_main!(benches);
