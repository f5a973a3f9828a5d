use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lifewire::*;
use std::sync::Arc;

struct Config {
    port: u16,
}

struct Repository {
    config: Arc<Config>,
}

impl Injectable for Repository {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::inject("")
            .param::<Config>("config", "")
            .activate(|args| Ok(Repository { config: args.next()? }))]
    }
}

struct Service {
    repository: Arc<Repository>,
}

impl Injectable for Service {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::inject("")
            .param::<Repository>("repository", "")
            .activate(|args| Ok(Service { repository: args.next()? }))]
    }
}

fn bench_singleton_hit(c: &mut Criterion) {
    let mut strategies = StrategyCollection::new();
    strategies.add_singleton_factory::<u64, _>("", |_| Ok(42));
    let container = strategies.build().unwrap();
    let _ = container.resolve::<u64>("").unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| black_box(container.resolve::<u64>("").unwrap()))
    });
}

fn bench_transient(c: &mut Criterion) {
    let mut strategies = StrategyCollection::new();
    strategies.add_transient::<Vec<u8>>("");
    let container = strategies.build().unwrap();

    c.bench_function("transient_default", |b| {
        b.iter(|| black_box(container.resolve::<Vec<u8>>("").unwrap()))
    });
}

fn bench_autowired_graph(c: &mut Criterion) {
    let mut strategies = StrategyCollection::new();
    strategies.add_instance("", Config { port: 80 });
    strategies.add_autowired::<Repository>("");
    strategies.add_autowired::<Service>("");
    let container = strategies.build().unwrap();

    c.bench_function("autowired_two_levels", |b| {
        b.iter(|| {
            let service = container.resolve::<Service>("").unwrap();
            black_box(service.repository.config.port)
        })
    });
}

fn bench_context_scope(c: &mut Criterion) {
    let mut group = c.benchmark_group("context_scope");
    for values in [1usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(values), &values, |b, &values| {
            let mut strategies = StrategyCollection::new();
            strategies.add_context_factory::<Vec<u8>, _>("", |_| Ok(Vec::new()));
            let container = strategies.build().unwrap();
            b.iter(|| {
                let scope = container.create_scope();
                for _ in 0..values {
                    black_box(scope.resolve::<Vec<u8>>("").unwrap());
                }
                scope.dispose().unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_singleton_hit,
    bench_transient,
    bench_autowired_graph,
    bench_context_scope
);
criterion_main!(benches);
