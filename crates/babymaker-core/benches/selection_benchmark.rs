use std::time::Duration;

use babymaker_core::{
    data::{test_event, InputContent},
    pick_best_objects,
    selection::{decode_vertex_indices, VertexQuality},
    Looper, LooperOptions,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const MUON_COUNTS: [usize; 3] = [2, 8, 32];

fn event_with_muons(n_muons: usize) -> babymaker_core::ScoutingEvent {
    let mut event = test_event();
    let template = event.muons.clone();
    event.muons = (0..n_muons)
        .map(|i| {
            let mut muon = template[i % 2].clone();
            muon.pt += i as f64;
            muon.vtx_indices = vec![(i / 2) as i32 % 2];
            muon
        })
        .collect();
    event
}

fn selection_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pick_best_objects");
    group.warm_up_time(Duration::from_millis(500));
    let quality = VertexQuality::default();
    for n_muons in MUON_COUNTS {
        let event = event_with_muons(n_muons);
        let origin = event.primary_vertices[0].position();
        let passid = event
            .vertices
            .iter()
            .map(|vertex| quality.passes(vertex, &origin))
            .collect::<Vec<_>>();
        group.bench_with_input(BenchmarkId::from_parameter(n_muons), &event, |b, event| {
            b.iter(|| {
                black_box(pick_best_objects(
                    black_box(&event.vertices),
                    &passid,
                    &event.muons,
                    event.id.run,
                    false,
                ))
            })
        });
    }
    group.finish();
}

fn decode_benchmarks(c: &mut Criterion) {
    let lists = (0..32)
        .scan(Vec::new(), |acc: &mut Vec<i32>, i| {
            acc.push(i % 4);
            Some(acc.clone())
        })
        .collect::<Vec<_>>();
    c.bench_function("decode_accumulating_indices", |b| {
        b.iter(|| black_box(decode_vertex_indices(black_box(&lists), true)))
    });
}

fn process_event_benchmarks(c: &mut Criterion) {
    let mut looper = Looper::new(LooperOptions::new().data_dir("benches"))
        .expect("looper should construct");
    let event = test_event();
    let content = InputContent::default();
    c.bench_function("process_event", |b| {
        b.iter(|| {
            black_box(
                looper
                    .process_event(black_box(&event), &content)
                    .expect("event should process"),
            )
        })
    });
}

criterion_group!(
    benches,
    selection_benchmarks,
    decode_benchmarks,
    process_event_benchmarks
);
criterion_main!(benches);
