// Export benchmark.
// Critical path: src/export.rs (CsvExporter::export)
// Measures: CSV serialization throughput for a batch of processed subjects.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qcnorm_core::export::CsvExporter;
use qcnorm_shared::{Metrics, ProcessedSubject, QualityAssessment, SubjectInfo, Verdict};
use std::collections::{BTreeMap, BTreeSet};

fn sample_subject(i: usize) -> ProcessedSubject {
    let mut subject_info = SubjectInfo::new(format!("sub-{i:05}"));
    subject_info.age = Some(25.0 + (i % 40) as f64);
    ProcessedSubject {
        subject_info,
        raw_metrics: Metrics {
            snr: Some(50.0),
            cjv: Some(0.3),
            ..Default::default()
        },
        normalized_metrics: None,
        assessment: QualityAssessment {
            overall: Verdict::Pass,
            per_metric: BTreeMap::new(),
            composite: 100.0,
            confidence: 1.0,
            recommendations: Vec::new(),
            flags: BTreeSet::new(),
            violations: BTreeMap::new(),
        },
        processing_timestamp: chrono::DateTime::from_timestamp(0, 0).unwrap(),
        processing_version: "0.1.0".to_string(),
        row_index: i,
    }
}

fn export_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("export_batch");
    for size in &[10, 100, 1000] {
        let subjects: Vec<_> = (0..*size).map(sample_subject).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &subjects, |b, subjects| {
            b.iter(|| {
                let mut buf = Vec::new();
                CsvExporter::export(&mut buf, black_box(subjects)).unwrap();
                black_box(buf);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, export_batch);
criterion_main!(benches);
