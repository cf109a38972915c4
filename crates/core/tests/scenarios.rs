//! End-to-end scenario tests exercising the pipeline the way a submitted
//! batch actually flows through it: ingest, classify, normalize, assess,
//! orchestrate, and (for longitudinal subjects) trend/transition detection.

use qcnorm_core::{
    AgeClassifier, Assessor, BatchOrchestrator, CsvIngester, EventBus, IngestedRow,
    LongitudinalEngine, Normalizer, NormativeDataset, NormativeStore, ThresholdResolver,
};
use qcnorm_shared::{
    AgeGroupTransition, BatchConfig, BatchStatus, Direction, LongitudinalSubject, MetricKind,
    Metrics, NormativeRecord, QcResult, SubjectInfo, Threshold, Timepoint, TrendDirection, Verdict,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn weights() -> BTreeMap<MetricKind, f64> {
    qcnorm_shared::METRIC_VOCABULARY.iter().map(|&m| (m, 1.0)).collect()
}

/// S1 (happy path): one well-formed row with every metric comfortably on
/// the `pass` side of its threshold.
#[test]
fn s1_happy_path_all_pass_with_full_composite() {
    let mut dataset = NormativeDataset::new("default", qcnorm_shared::default_age_groups()).unwrap();
    dataset.insert_record(
        "young_adult",
        NormativeRecord {
            metric: MetricKind::Snr,
            mean: 12.0,
            sd: 2.0,
            p5: 8.0,
            p25: 10.0,
            p50: 12.0,
            p75: 14.0,
            p95: 16.0,
            sample_size: 300,
        },
    );
    dataset.insert_record(
        "young_adult",
        NormativeRecord {
            metric: MetricKind::Efc,
            mean: 0.50,
            sd: 0.08,
            p5: 0.30,
            p25: 0.40,
            p50: 0.50,
            p75: 0.60,
            p95: 0.70,
            sample_size: 300,
        },
    );

    let metrics = Metrics {
        snr: Some(15.0),
        cnr: Some(3.5),
        efc: Some(0.45),
        ..Default::default()
    };

    let normalized = Normalizer::normalize(&metrics, &dataset, "young_adult");
    let snr_z = normalized.values[&MetricKind::Snr].z_score;
    assert!((snr_z - 1.5).abs() < 1e-9, "z(snr) expected 1.5, got {snr_z}");
    let efc_pct = normalized.values[&MetricKind::Efc].percentile;
    assert!((25.0..=50.0).contains(&efc_pct), "percentile(efc) expected in [25, 50], got {efc_pct}");

    let overrides = [
        Threshold { metric: MetricKind::Snr, warn: 10.0, fail: 8.0, direction: Direction::HigherBetter },
        Threshold { metric: MetricKind::Efc, warn: 0.55, fail: 0.65, direction: Direction::LowerBetter },
        Threshold { metric: MetricKind::Cnr, warn: 3.0, fail: 2.0, direction: Direction::HigherBetter },
    ];
    let resolver = ThresholdResolver::new(&overrides);
    let w = weights();
    let assessor = Assessor::new(&w);
    let assessment = assessor.assess(&metrics, &resolver, &dataset, "young_adult", Some(&normalized));

    assert_eq!(assessment.per_metric[&MetricKind::Snr], Verdict::Pass);
    assert_eq!(assessment.per_metric[&MetricKind::Cnr], Verdict::Pass);
    assert_eq!(assessment.per_metric[&MetricKind::Efc], Verdict::Pass);
    assert_eq!(assessment.overall, Verdict::Pass);
    assert_eq!(assessment.composite, 100.0);
}

/// S2 (mixed): an elderly subject whose snr and cnr both land exactly on
/// the warning side of their respective thresholds.
#[test]
fn s2_mixed_warnings_yield_warning_overall_and_composite_sixty() {
    let dataset = NormativeDataset::new("default", qcnorm_shared::default_age_groups()).unwrap();
    let overrides = [
        Threshold { metric: MetricKind::Snr, warn: 10.0, fail: 8.0, direction: Direction::HigherBetter },
        Threshold { metric: MetricKind::Cnr, warn: 2.5, fail: 2.0, direction: Direction::HigherBetter },
    ];
    let resolver = ThresholdResolver::new(&overrides);
    let w = weights();
    let assessor = Assessor::new(&w);
    let metrics = Metrics { snr: Some(8.0), cnr: Some(2.0), ..Default::default() };
    let assessment = assessor.assess(&metrics, &resolver, &dataset, "elderly", None);

    assert_eq!(assessment.per_metric[&MetricKind::Snr], Verdict::Warning);
    assert_eq!(assessment.per_metric[&MetricKind::Cnr], Verdict::Warning);
    assert_eq!(assessment.overall, Verdict::Warning);
    assert_eq!(assessment.composite, 60.0);
}

/// S3 (PII rejection): a row whose subject_id looks like an SSN is
/// rejected by the ingester, and the batch it feeds records it as a
/// failure with no ProcessedSubject produced for it.
#[tokio::test]
async fn s3_pii_subject_id_rejected_and_counted_as_failure() {
    let ingester = CsvIngester::new(1024 * 1024);
    let csv = "subject_id,age,snr\n123-45-6789,25,50.0\n";
    let rows = ingester.ingest(csv.as_bytes()).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(matches!(rows[0], Err(qcnorm_shared::QcError::Pii { row_index: 0 })));

    let store = Arc::new(NormativeStore::new());
    store.register(NormativeDataset::new("default", qcnorm_shared::default_age_groups()).unwrap());
    let bus = Arc::new(EventBus::new(16));
    let orchestrator = BatchOrchestrator::new(store, bus, 2, 10, weights());

    let (state, subjects) = orchestrator
        .run("batch-s3".to_string(), rows, BatchConfig::default(), None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.status, BatchStatus::Failed);
    assert_eq!(state.progress.completed, 0);
    assert_eq!(state.progress.failed, 1);
    assert!(subjects.is_empty());
    assert_eq!(state.errors[0].code, "validation/pii");
}

/// S4 (cancellation): a large batch is cancelled partway through; the
/// terminal status is `cancelled`, at least the rows observed complete
/// before cancellation stay completed, and the final event on the topic
/// is `batch_cancelled`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn s4_cancellation_midway_yields_cancelled_with_partial_progress() {
    let store = Arc::new(NormativeStore::new());
    store.register(NormativeDataset::new("default", qcnorm_shared::default_age_groups()).unwrap());
    let bus = Arc::new(EventBus::new(4096));
    let mut subscriber = bus.subscribe();
    let orchestrator = Arc::new(BatchOrchestrator::new(Arc::clone(&store), Arc::clone(&bus), 4, 10, weights()));

    // Large enough that the mpsc channel's bounded capacity forces many
    // feeder/worker suspension points, giving the observer below a real
    // chance to see progress and cancel before the batch finishes on its
    // own.
    let rows: Vec<QcResult<IngestedRow>> = (0..20_000)
        .map(|i| {
            let mut subject = SubjectInfo::new(format!("sub-{i}"));
            subject.age = Some(25.0);
            Ok(IngestedRow { row_index: i, subject, metrics: Metrics { snr: Some(50.0), ..Default::default() } })
        })
        .collect();

    let cancel = CancellationToken::new();
    let run_handle = {
        let orchestrator = Arc::clone(&orchestrator);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            orchestrator
                .run("batch-s4".to_string(), rows, BatchConfig::default(), None, cancel)
                .await
                .unwrap()
        })
    };

    let mut observed_completed = 0usize;
    loop {
        match subscriber.recv().await {
            Some(qcnorm_shared::BatchEvent::BatchProgress { completed, .. }) => {
                observed_completed = completed;
                if completed >= 100 {
                    break;
                }
            }
            Some(event) if event.is_terminal() => break,
            Some(_) => {}
            None => break,
        }
    }
    cancel.cancel();

    let (state, subjects) = run_handle.await.unwrap();

    assert_eq!(state.status, BatchStatus::Cancelled);
    assert!(state.progress.completed >= observed_completed);
    assert!(state.progress.completed < 20_000, "cancellation should stop new rows from starting");
    assert_eq!(state.progress.completed, subjects.len());

    let mut last_event = None;
    while let Ok(Some(event)) =
        tokio::time::timeout(std::time::Duration::from_millis(50), subscriber.recv()).await
    {
        last_event = Some(event);
    }
    assert!(last_event.map(|e| e.is_terminal()).unwrap_or(true));
}

/// S5 (longitudinal trend): three timepoints at days 0, 180, 365 with
/// snr improving from 12 to 14 fit an OLS line with slope ~0.00548/day
/// and R² close to 1.
#[test]
fn s5_longitudinal_trend_detects_improving_slope() {
    let mut subject = LongitudinalSubject::new("sub-010");
    for (id, days, value) in [("t0", 0.0, 12.0), ("t1", 180.0, 13.0), ("t2", 365.0, 14.0)] {
        subject.add_timepoint(Timepoint {
            timepoint_id: id.to_string(),
            session: Some(id.to_string()),
            days_from_baseline: days,
            age_at_scan: None,
            age_group: Some("young_adult".to_string()),
            raw_metrics: Metrics { snr: Some(value), ..Default::default() },
            overall_verdict: Verdict::Pass,
        });
    }

    let engine = LongitudinalEngine::new(0.0001, 10.0);
    let trend = engine.trend(&subject, MetricKind::Snr);

    let slope = trend.slope.unwrap();
    assert!((slope - 0.00548).abs() < 1e-3, "slope expected ~0.00548/day, got {slope}");
    assert!(trend.r_squared.unwrap() > 0.999);
    assert_eq!(trend.direction, TrendDirection::Improving);
}

/// S6 (age-group crossing): a timepoint classified `adolescent` followed
/// by one classified `young_adult` produces exactly one age-group
/// transition.
#[test]
fn s6_age_group_crossing_detected_once() {
    let classifier = AgeClassifier::new(qcnorm_shared::default_age_groups()).unwrap();
    let group_t0 = classifier.classify(17.9).unwrap();
    let group_t1 = classifier.classify(18.1).unwrap();
    assert_eq!(group_t0, "adolescent");
    assert_eq!(group_t1, "young_adult");

    let mut subject = LongitudinalSubject::new("sub-020");
    subject.add_timepoint(Timepoint {
        timepoint_id: "t0".to_string(),
        session: Some("ses-1".to_string()),
        days_from_baseline: 0.0,
        age_at_scan: Some(17.9),
        age_group: Some(group_t0),
        raw_metrics: Metrics { snr: Some(50.0), ..Default::default() },
        overall_verdict: Verdict::Pass,
    });
    subject.add_timepoint(Timepoint {
        timepoint_id: "t1".to_string(),
        session: Some("ses-2".to_string()),
        days_from_baseline: 73.0,
        age_at_scan: Some(18.1),
        age_group: Some(group_t1),
        raw_metrics: Metrics { snr: Some(51.0), ..Default::default() },
        overall_verdict: Verdict::Pass,
    });

    let engine = LongitudinalEngine::new(0.01, 0.5);
    let trend = engine.trend(&subject, MetricKind::Snr);
    assert_eq!(trend.age_group_changes.len(), 1);
    let transition: &AgeGroupTransition = &trend.age_group_changes[0];
    assert_eq!(transition.from_group, "adolescent");
    assert_eq!(transition.to_group, "young_adult");
}
