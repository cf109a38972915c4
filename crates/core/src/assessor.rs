//! Quality assessment: per-metric verdicts from resolved
//! thresholds, rolled up into an overall verdict, a weighted composite
//! score, a confidence estimate, and plain-language recommendations.

use crate::normative_store::NormativeDataset;
use crate::threshold::ThresholdResolver;
use qcnorm_shared::{
    Metrics, MetricKind, NormalizedMetrics, QualityAssessment, Threshold, Verdict, Violation,
    METRIC_VOCABULARY,
};
use std::collections::{BTreeMap, BTreeSet};

pub struct Assessor<'a> {
    weights: &'a BTreeMap<MetricKind, f64>,
}

impl<'a> Assessor<'a> {
    #[must_use]
    pub fn new(weights: &'a BTreeMap<MetricKind, f64>) -> Self {
        Self { weights }
    }

    /// Assesses `metrics` against thresholds resolved for `age_group`. A
    /// metric with no present value is skipped; a metric with a present
    /// value but no resolvable threshold contributes `Verdict::Uncertain`
    /// and is recorded in `flags` — missing policy is not fatal. When
    /// `normalized` is available, confidence is attenuated by how extreme
    /// the worst z-score is.
    #[must_use]
    pub fn assess(
        &self,
        metrics: &Metrics,
        resolver: &ThresholdResolver<'_>,
        dataset: &NormativeDataset,
        age_group: &str,
        normalized: Option<&NormalizedMetrics>,
    ) -> QualityAssessment {
        let mut per_metric = BTreeMap::new();
        let mut violations = BTreeMap::new();
        let mut flags = BTreeSet::new();
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut concrete_count = 0usize;
        let mut total_count = 0usize;
        let mut warning_count = 0usize;
        let mut any_fail = false;

        for metric in METRIC_VOCABULARY {
            let Some(raw) = metrics.get(metric) else {
                continue;
            };
            total_count += 1;

            let verdict = match resolver.resolve(metric, dataset, age_group) {
                Some(threshold) => {
                    let (verdict, crossed) = classify(raw, &threshold);
                    if let Some(crossed) = crossed {
                        violations.insert(
                            metric,
                            Violation {
                                value: raw,
                                crossed_threshold: crossed,
                                severity: verdict,
                            },
                        );
                    }
                    verdict
                }
                None => {
                    flags.insert(format!("no_policy:{metric}"));
                    Verdict::Uncertain
                }
            };

            if verdict.is_concrete() {
                concrete_count += 1;
                let weight = self.weights.get(&metric).copied().unwrap_or(1.0);
                weighted_sum += weight * verdict.score();
                weight_total += weight;
            }
            match verdict {
                Verdict::Warning => warning_count += 1,
                Verdict::Fail => any_fail = true,
                _ => {}
            }
            per_metric.insert(metric, verdict);
        }

        let composite = if weight_total > 0.0 {
            100.0 * weighted_sum / weight_total
        } else {
            50.0
        };
        let base_confidence = if total_count == 0 {
            0.0
        } else {
            concrete_count as f64 / total_count as f64
        };
        let confidence = match normalized.and_then(max_abs_z) {
            Some(max_z) => {
                if max_z > 10.0 {
                    tracing::warn!(max_z, "extreme z-score observed for this subject");
                }
                base_confidence * (1.0 - (max_z / 10.0).min(1.0))
            }
            None => base_confidence,
        };
        let warning_ratio = if total_count == 0 {
            0.0
        } else {
            warning_count as f64 / total_count as f64
        };
        let overall = overall_verdict(any_fail, warning_ratio, composite, concrete_count > 0);
        let mut recommendations = build_recommendations(&violations, &flags);
        recommendations.extend(extreme_value_recommendations(normalized));

        QualityAssessment {
            overall,
            per_metric,
            composite,
            confidence,
            recommendations,
            flags,
            violations,
        }
    }
}

/// Ordered rules, first match wins: any `fail` makes the overall `fail`;
/// else a warning share of at least 20% or a composite below 70 makes it
/// `warning`; else no concrete verdict at all makes it `uncertain`;
/// otherwise `pass`.
fn overall_verdict(any_fail: bool, warning_ratio: f64, composite: f64, saw_concrete: bool) -> Verdict {
    if any_fail {
        Verdict::Fail
    } else if warning_ratio >= 0.2 || composite < 70.0 {
        Verdict::Warning
    } else if !saw_concrete {
        Verdict::Uncertain
    } else {
        Verdict::Pass
    }
}

/// Largest `|z|` across normalized values, used to attenuate confidence
/// for subjects whose metrics sit far outside the normative distribution.
fn max_abs_z(normalized: &NormalizedMetrics) -> Option<f64> {
    normalized
        .values
        .values()
        .map(|v| v.z_score.abs())
        .fold(None, |acc, z| Some(acc.map_or(z, |a: f64| a.max(z))))
}

/// Classifies `raw` against `threshold`, returning the crossed boundary
/// value when the verdict is not `pass`.
fn classify(raw: f64, threshold: &Threshold) -> (Verdict, Option<f64>) {
    use qcnorm_shared::Direction;
    match threshold.direction {
        Direction::HigherBetter => {
            if raw < threshold.fail {
                (Verdict::Fail, Some(threshold.fail))
            } else if raw < threshold.warn {
                (Verdict::Warning, Some(threshold.warn))
            } else {
                (Verdict::Pass, None)
            }
        }
        Direction::LowerBetter => {
            if raw > threshold.fail {
                (Verdict::Fail, Some(threshold.fail))
            } else if raw > threshold.warn {
                (Verdict::Warning, Some(threshold.warn))
            } else {
                (Verdict::Pass, None)
            }
        }
    }
}

/// Per-metric "verify unit" recommendation for z-scores that are extreme
/// (`|z| > 10`) but not yet implausible enough to be a recorded error
/// (`|z| <= 50`, which instead carries `NormalizedValue.error`).
fn extreme_value_recommendations(normalized: Option<&NormalizedMetrics>) -> Vec<String> {
    let Some(normalized) = normalized else {
        return Vec::new();
    };
    normalized
        .values
        .iter()
        .filter(|(_, v)| v.z_score.abs() > 10.0 && v.error.is_none())
        .map(|(metric, _)| format!("{metric}: value extreme; verify unit"))
        .collect()
}

fn build_recommendations(
    violations: &BTreeMap<MetricKind, Violation>,
    flags: &BTreeSet<String>,
) -> Vec<String> {
    let mut recs: Vec<String> = violations
        .iter()
        .filter(|(_, v)| v.severity == Verdict::Fail)
        .map(|(metric, v)| {
            format!("{metric} at {:.3} crossed the fail threshold ({:.3})", v.value, v.crossed_threshold)
        })
        .collect();
    recs.extend(
        violations
            .iter()
            .filter(|(_, v)| v.severity == Verdict::Warning)
            .map(|(metric, v)| {
                format!("{metric} at {:.3} crossed the warn threshold ({:.3})", v.value, v.crossed_threshold)
            }),
    );
    if !flags.is_empty() {
        recs.push(format!("{} metric(s) had no applicable threshold policy", flags.len()));
    }
    recs
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::normative_store::NormativeDataset;
    use proptest::prelude::*;

    fn arb_metrics() -> impl Strategy<Value = Metrics> {
        proptest::collection::vec(any::<Option<bool>>(), METRIC_VOCABULARY.len()).prop_map(|flags| {
            let mut metrics = Metrics::default();
            for (metric, flag) in METRIC_VOCABULARY.iter().zip(flags) {
                if let Some(sign) = flag {
                    let (lo, hi) = metric.sane_range();
                    let lo = if lo.is_finite() { lo } else { 0.0 };
                    let hi = if hi.is_finite() { hi } else { lo + 100.0 };
                    let value = if sign { lo } else { hi };
                    metrics.set(*metric, Some(value));
                }
            }
            metrics
        })
    }

    proptest! {
        /// Composite always lands in [0, 100], and a `pass` overall
        /// verdict never comes with a composite below 70.
        #[test]
        fn composite_is_bounded_and_consistent_with_overall(metrics in arb_metrics()) {
            let ds = NormativeDataset::new("default", qcnorm_shared::default_age_groups()).unwrap();
            let resolver = ThresholdResolver::new(&[]);
            let w: BTreeMap<_, _> = METRIC_VOCABULARY.iter().map(|&m| (m, 1.0)).collect();
            let assessor = Assessor::new(&w);
            let assessment = assessor.assess(&metrics, &resolver, &ds, "young_adult", None);

            prop_assert!(assessment.composite >= 0.0 && assessment.composite <= 100.0);
            if assessment.overall == Verdict::Pass {
                prop_assert!(assessment.composite >= 70.0);
            }
        }

        /// `assess` is a pure function: identical inputs always produce an
        /// identical assessment.
        #[test]
        fn assess_is_deterministic(metrics in arb_metrics()) {
            let ds = NormativeDataset::new("default", qcnorm_shared::default_age_groups()).unwrap();
            let resolver = ThresholdResolver::new(&[]);
            let w: BTreeMap<_, _> = METRIC_VOCABULARY.iter().map(|&m| (m, 1.0)).collect();
            let assessor = Assessor::new(&w);

            let first = assessor.assess(&metrics, &resolver, &ds, "young_adult", None);
            let second = assessor.assess(&metrics, &resolver, &ds, "young_adult", None);

            prop_assert_eq!(first.overall, second.overall);
            prop_assert_eq!(first.composite, second.composite);
            prop_assert_eq!(first.confidence, second.confidence);
            prop_assert_eq!(first.per_metric, second.per_metric);
        }
    }
}
