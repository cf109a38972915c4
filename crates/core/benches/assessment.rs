// Assessment benchmark.
// Critical path: src/assessor.rs (Assessor::assess)
// Measures: threshold resolution + verdict rollup across the full metric vocabulary.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qcnorm_core::assessor::Assessor;
use qcnorm_core::test_utils::sample_normative_store;
use qcnorm_core::threshold::ThresholdResolver;
use qcnorm_shared::Metrics;
use std::collections::BTreeMap;

fn assess_full_vocabulary(c: &mut Criterion) {
    let store = sample_normative_store();
    let dataset = store.require("default").unwrap();
    let resolver = ThresholdResolver::new(&[]);
    let weights: BTreeMap<_, _> = qcnorm_shared::METRIC_VOCABULARY.iter().map(|&m| (m, 1.0)).collect();
    let assessor = Assessor::new(&weights);

    let mut metrics = Metrics::default();
    for metric in qcnorm_shared::METRIC_VOCABULARY {
        let (lo, hi) = metric.sane_range();
        let lo = if lo.is_finite() { lo } else { 0.0 };
        let hi = if hi.is_finite() { hi } else { lo + 100.0 };
        metrics.set(metric, Some(lo + (hi - lo) * 0.5));
    }

    c.bench_function("assess_full_vocabulary", |b| {
        b.iter(|| {
            black_box(assessor.assess(&metrics, &resolver, &dataset, "young_adult", None));
        });
    });
}

criterion_group!(benches, assess_full_vocabulary);
criterion_main!(benches);
