// Normalization benchmark.
// Critical path: src/normalizer.rs (Normalizer::normalize)
// Measures: percentile interpolation + z-score across the full metric vocabulary.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qcnorm_core::normalizer::Normalizer;
use qcnorm_core::test_utils::sample_normative_store;
use qcnorm_shared::Metrics;

fn normalize_full_vocabulary(c: &mut Criterion) {
    let store = sample_normative_store();
    let dataset = store.require("default").unwrap();

    let mut metrics = Metrics::default();
    for metric in qcnorm_shared::METRIC_VOCABULARY {
        let (lo, hi) = metric.sane_range();
        let lo = if lo.is_finite() { lo } else { 0.0 };
        let hi = if hi.is_finite() { hi } else { lo + 100.0 };
        metrics.set(metric, Some(lo + (hi - lo) * 0.5));
    }

    c.bench_function("normalize_full_vocabulary", |b| {
        b.iter(|| {
            black_box(Normalizer::normalize(&metrics, &dataset, "young_adult"));
        });
    });
}

criterion_group!(benches, normalize_full_vocabulary);
criterion_main!(benches);
