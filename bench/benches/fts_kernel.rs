//! Benchmarks the hot paths of the full-text search kernel on synthetic posting lists:
//! the k-way cross-intersection and the top-k aggregation.

use codspeed_criterion_compat::{Criterion, criterion_group, criterion_main};
use text_fusion_bench::{synthetic_entity_postings, synthetic_word_stream};
use text_fusion_index::{agg_scores_and_take_top_k_contexts, cross_intersect_k_way};
use text_fusion_model::ValueTable;

fn k_way_intersection(c: &mut Criterion) {
    let lists = vec![
        synthetic_word_stream(100_000, 20_000, 1),
        synthetic_word_stream(100_000, 20_000, 2),
        synthetic_word_stream(10_000, 20_000, 3),
    ];

    c.bench_function("k-way cross-intersect, 3 lists", |b| {
        b.iter(|| cross_intersect_k_way(&lists, None).unwrap());
    });
}

fn top_k_aggregation(c: &mut Criterion) {
    let postings = synthetic_entity_postings(200_000, 50_000, 5_000, 4);

    c.bench_function("aggregate scores, k = 1", |b| {
        b.iter(|| {
            let mut result = ValueTable::new(4);
            agg_scores_and_take_top_k_contexts(&postings, 1, &mut result).unwrap();
            result.len()
        });
    });

    c.bench_function("aggregate scores, k = 5", |b| {
        b.iter(|| {
            let mut result = ValueTable::new(4);
            agg_scores_and_take_top_k_contexts(&postings, 5, &mut result).unwrap();
            result.len()
        });
    });
}

criterion_group!(benches, k_way_intersection, top_k_aggregation);
criterion_main!(benches);
