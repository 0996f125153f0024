//! Reconciliation benchmarks
//!
//! Measures mount, keyed update and state-driven re-render of long lists
//! against the in-memory host.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parking_lot::Mutex;
use std::sync::Arc;

use fibril_core::{Component, Element, MemoryHost, Props, Renderer, Scheduler, SetState};

fn list(keys: impl Iterator<Item = usize>) -> Element {
    Element::host("ul").children(keys.map(|key| {
        Element::host("li")
            .with_key(key.to_string())
            .prop("data-index", key)
            .child(format!("item {key}"))
    }))
}

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("mount");
    for size in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let host = MemoryHost::new();
                let scheduler = Scheduler::new();
                let renderer = Renderer::new(host.clone(), scheduler.clone());
                renderer.render(list(0..size), host.create_container());
                scheduler.run_until_idle();
                black_box(host.node_count())
            });
        });
    }
    group.finish();
}

fn bench_keyed_removal(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_removal");
    for size in [100usize, 1_000] {
        let host = MemoryHost::new();
        let scheduler = Scheduler::new();
        let renderer = Renderer::new(host.clone(), scheduler.clone());
        let container = host.create_container();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                renderer.render(list(0..size), container);
                scheduler.run_until_idle();
                // Drop every tenth item.
                renderer.render(list((0..size).filter(|i| i % 10 != 0)), container);
                scheduler.run_until_idle();
            });
        });
    }
    group.finish();
}

fn bench_state_update(c: &mut Criterion) {
    let host = MemoryHost::new();
    let scheduler = Scheduler::new();
    let renderer = Renderer::new(host.clone(), scheduler.clone());
    let setter: Arc<Mutex<Option<SetState<usize>>>> = Arc::new(Mutex::new(None));

    let counter = {
        let setter = setter.clone();
        Component::new("Counter", move |hooks, _| {
            let (count, set_count) = hooks.use_state(0usize)?;
            *setter.lock() = Some(set_count);
            Ok(vec![Element::host("span").child(count).into()])
        })
    };
    let siblings = list(0..500);
    renderer.render(
        Element::host("main")
            .child(Element::component(&counter, Props::new()))
            .child(siblings),
        host.create_container(),
    );
    scheduler.run_until_idle();

    let Some(set_count) = setter.lock().clone() else {
        return;
    };
    c.bench_function("state_update_beside_500_siblings", |b| {
        b.iter(|| {
            set_count.update(|n| n + 1);
            scheduler.run_until_idle();
        });
    });
}

criterion_group!(benches, bench_mount, bench_keyed_removal, bench_state_update);
criterion_main!(benches);
