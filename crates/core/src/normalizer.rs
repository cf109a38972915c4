//! Age-normed percentile/z-score normalization.
//!
//! Percentiles are interpolated piecewise-linearly across the five anchor
//! points (p5/p25/p50/p75/p95) carried on every `NormativeRecord`. A raw
//! value outside the anchor range falls back to the normal CDF centered on
//! the record's mean/sd, since the anchors alone give no information past
//! the tails.

use crate::normative_store::NormativeDataset;
use crate::stats::normal_cdf;
use qcnorm_shared::{Metrics, NormalizedMetrics, NormalizedValue, NormativeRecord};
use std::collections::BTreeMap;

pub struct Normalizer;

impl Normalizer {
    /// Normalizes every present metric in `metrics` against `dataset`'s
    /// records for `age_group`. Metrics with no matching normative record
    /// are silently omitted from the result (a missing normative record is
    /// not fatal").
    #[must_use]
    pub fn normalize(
        metrics: &Metrics,
        dataset: &NormativeDataset,
        age_group: &str,
    ) -> NormalizedMetrics {
        let mut values = BTreeMap::new();
        for (metric, raw) in metrics.iter_present() {
            if let Some(record) = dataset.record(age_group, metric) {
                values.insert(metric, normalize_one(raw, record));
            }
        }
        NormalizedMetrics {
            age_group: age_group.to_string(),
            dataset_name: dataset.name.clone(),
            values,
        }
    }
}

/// Magnitude past which a z-score is treated as implausible rather than
/// merely extreme (`error`, not just a recommendation).
const Z_SCORE_ERROR_THRESHOLD: f64 = 50.0;
/// Magnitude past which an in-range z-score still earns a "verify unit"
/// recommendation.
const Z_SCORE_EXTREME_THRESHOLD: f64 = 10.0;

fn normalize_one(raw: f64, record: &NormativeRecord) -> NormalizedValue {
    let z_score = if record.sd > 0.0 {
        (raw - record.mean) / record.sd
    } else {
        0.0
    };
    let percentile = interpolate_percentile(raw, record);
    let error = if z_score.abs() > Z_SCORE_ERROR_THRESHOLD {
        Some(format!(
            "z-score magnitude {:.1} exceeds {Z_SCORE_ERROR_THRESHOLD}; value likely erroneous",
            z_score.abs()
        ))
    } else {
        None
    };
    NormalizedValue { percentile, z_score, error }
}

/// Piecewise-linear interpolation across (p5, p25, p50, p75, p95), falling
/// back to a normal-CDF estimate outside that range.
fn interpolate_percentile(raw: f64, record: &NormativeRecord) -> f64 {
    let anchors: [(f64, f64); 5] = [
        (5.0, record.p5),
        (25.0, record.p25),
        (50.0, record.p50),
        (75.0, record.p75),
        (95.0, record.p95),
    ];

    if raw < anchors[0].1 || raw > anchors[4].1 {
        let z = if record.sd > 0.0 {
            (raw - record.mean) / record.sd
        } else {
            0.0
        };
        return (normal_cdf(z) * 100.0).clamp(0.0, 100.0);
    }

    for window in anchors.windows(2) {
        let (p_lo, v_lo) = window[0];
        let (p_hi, v_hi) = window[1];
        if raw >= v_lo && raw <= v_hi {
            if (v_hi - v_lo).abs() < f64::EPSILON {
                return p_lo;
            }
            let frac = (raw - v_lo) / (v_hi - v_lo);
            return p_lo + frac * (p_hi - p_lo);
        }
    }
    50.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcnorm_shared::MetricKind;

    fn record() -> NormativeRecord {
        NormativeRecord {
            metric: MetricKind::Snr,
            mean: 50.0,
            sd: 10.0,
            p5: 30.0,
            p25: 42.0,
            p50: 50.0,
            p75: 58.0,
            p95: 70.0,
            sample_size: 500,
        }
    }

    #[test]
    fn median_value_maps_to_50th_percentile() {
        assert!((interpolate_percentile(50.0, &record()) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn anchor_values_map_exactly() {
        let r = record();
        assert!((interpolate_percentile(30.0, &r) - 5.0).abs() < 1e-9);
        assert!((interpolate_percentile(70.0, &r) - 95.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_falls_back_to_normal_cdf() {
        let r = record();
        let p = interpolate_percentile(200.0, &r);
        assert!(p > 95.0 && p <= 100.0);
        let p_low = interpolate_percentile(-100.0, &r);
        assert!(p_low < 5.0 && p_low >= 0.0);
    }

    #[test]
    fn z_score_zero_at_mean() {
        let nv = normalize_one(50.0, &record());
        assert!(nv.z_score.abs() < 1e-9);
        assert!(nv.error.is_none());
    }

    #[test]
    fn implausible_z_score_is_recorded_as_an_error() {
        let nv = normalize_one(50.0 + 10.0 * 51.0, &record());
        assert!(nv.z_score.abs() > 50.0);
        assert!(nv.error.is_some());
    }

    #[test]
    fn normalize_skips_metrics_without_normative_record() {
        let mut ds = crate::normative_store::NormativeDataset::new(
            "default",
            qcnorm_shared::default_age_groups(),
        )
        .unwrap();
        ds.insert_record("young_adult", record());
        let metrics = Metrics {
            snr: Some(55.0),
            cnr: Some(3.0),
            ..Default::default()
        };
        let normalized = Normalizer::normalize(&metrics, &ds, "young_adult");
        assert!(normalized.values.contains_key(&MetricKind::Snr));
        assert!(!normalized.values.contains_key(&MetricKind::Cnr));
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_record() -> impl Strategy<Value = NormativeRecord> {
        (1.0..200.0f64, 0.0..50.0f64).prop_flat_map(|(mean, sd)| {
            (Just(mean), Just(sd), 0.0..1.0f64, 0.0..1.0f64, 0.0..1.0f64, 0.0..1.0f64).prop_map(
                move |(mean, sd, a, b, c, d)| {
                    let mut fracs = [a, b, c, d];
                    fracs.sort_by(|x, y| x.partial_cmp(y).unwrap());
                    let span = sd.max(1.0) * 8.0;
                    let base = mean - span / 2.0;
                    NormativeRecord {
                        metric: qcnorm_shared::MetricKind::Snr,
                        mean,
                        sd,
                        p5: base,
                        p25: base + fracs[0] * span,
                        p50: base + fracs[1] * span,
                        p75: base + fracs[2] * span,
                        p95: base + fracs[3] * span,
                        sample_size: 100,
                    }
                },
            )
        })
    }

    proptest! {
        /// Percentile is always clamped to [0, 100], whether the raw value
        /// falls inside the anchor range or triggers the normal-CDF
        /// fallback.
        #[test]
        fn percentile_is_always_clamped(record in arb_record(), raw in -1000.0..1000.0f64) {
            let p = interpolate_percentile(raw, &record);
            prop_assert!((0.0..=100.0).contains(&p), "percentile {p} out of [0, 100]");
        }
    }
}
