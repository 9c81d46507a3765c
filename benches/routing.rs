//! Routing benchmarks.

#![allow(missing_docs, clippy::unwrap_used)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use director_rs::agents::{PromptSet, Services, build_director};
use director_rs::completion::{ScriptedCompletion, SharedCompletion};
use director_rs::config::{FanOut, Settings};
use director_rs::routing::{Granularity, RoutingTable, classify};
use director_rs::storage::{SqliteStore, Store, seed_defaults};
use std::hint::black_box;
use std::sync::Arc;

const MESSAGES: &[&str] = &[
    "hello there",
    "I bought a kettlebell for my home gym",
    "Plan healthy meals within my budget",
    "What's a good workout schedule around my project deadline and study plan?",
];

fn bench_classify(c: &mut Criterion) {
    let table = RoutingTable::default_table();
    c.bench_function("classify_domains", |b| {
        b.iter(|| {
            for text in MESSAGES {
                black_box(classify(black_box(text), &table.domains, Granularity::Domain));
            }
        });
    });
}

fn bench_multi_domain(c: &mut Criterion) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.init().unwrap();
    seed_defaults(store.as_ref(), "health").unwrap();

    let mut group = c.benchmark_group("multi_domain");
    for (name, fan_out) in [("sequential", FanOut::Sequential), ("parallel", FanOut::Parallel)] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let shared: Arc<dyn Store> = store.clone();
                    let completion: SharedCompletion =
                        Arc::new(ScriptedCompletion::new().with_default("ok"));
                    let services = Services::new(
                        shared,
                        completion,
                        Arc::new(RoutingTable::default_table()),
                        PromptSet::defaults(),
                    );
                    let settings = Settings {
                        fan_out,
                        ..Settings::default()
                    };
                    build_director(services, &settings)
                },
                |mut director| black_box(director.chat(MESSAGES[3])),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_multi_domain);
criterion_main!(benches);
