//! Longitudinal trend analysis: closed-form OLS regression of
//! a metric's values against days-from-baseline, plus age-group and
//! quality-status transition detection across a subject's ordered
//! timepoints.

use crate::stats::normal_cdf;
use qcnorm_shared::{
    AgeGroupTransition, LongitudinalSubject, MetricKind, QualityStatusChange, Timepoint, Trend,
    TrendDirection, TrendPoint,
};

pub struct LongitudinalEngine {
    stable_slope_epsilon: f64,
    stable_sigma_epsilon: f64,
}

impl LongitudinalEngine {
    #[must_use]
    pub fn new(stable_slope_epsilon: f64, stable_sigma_epsilon: f64) -> Self {
        Self {
            stable_slope_epsilon,
            stable_sigma_epsilon,
        }
    }

    /// Builds a `Trend` for `metric` across `subject`'s timepoints. Fewer
    /// than two points with a present value for `metric` yields a `Trend`
    /// with no slope/r_squared/p_value and direction `Stable`
    /// edge case: insufficient data is not an error).
    #[must_use]
    pub fn trend(&self, subject: &LongitudinalSubject, metric: MetricKind) -> Trend {
        let points: Vec<(f64, f64, Option<f64>, &Timepoint)> = subject
            .timepoints
            .iter()
            .filter_map(|tp| {
                tp.raw_metrics
                    .get(metric)
                    .map(|v| (tp.days_from_baseline, v, tp.age_at_scan, tp))
            })
            .collect();

        let values_over_time: Vec<(String, TrendPoint)> = points
            .iter()
            .map(|(days, value, age, tp)| {
                (
                    tp.timepoint_id.clone(),
                    TrendPoint {
                        value: *value,
                        days_from_baseline: *days,
                        age_at_scan: *age,
                    },
                )
            })
            .collect();

        let age_group_changes = age_group_transitions(&subject.timepoints);
        let quality_status_changes = quality_status_transitions(&subject.timepoints);

        if points.len() < 2 {
            return Trend {
                subject_id: subject.subject_id.clone(),
                metric,
                direction: TrendDirection::Stable,
                slope: None,
                r_squared: None,
                p_value: None,
                values_over_time,
                age_group_changes,
                quality_status_changes,
            };
        }

        let xs: Vec<f64> = points.iter().map(|(d, ..)| *d).collect();
        let ys: Vec<f64> = points.iter().map(|(_, v, ..)| *v).collect();
        let fit = ols(&xs, &ys);

        let direction = classify_direction(metric, fit.slope, fit.r_squared, self.stable_slope_epsilon);
        let direction = refine_for_variability(direction, &ys, self.stable_sigma_epsilon);

        Trend {
            subject_id: subject.subject_id.clone(),
            metric,
            direction,
            slope: Some(fit.slope),
            r_squared: Some(fit.r_squared),
            p_value: Some(fit.p_value),
            values_over_time,
            age_group_changes,
            quality_status_changes,
        }
    }
}

struct OlsFit {
    slope: f64,
    r_squared: f64,
    p_value: f64,
}

/// Closed-form simple linear regression `y = a + b*x`. The p-value for the
/// slope is approximated via the standard normal distribution rather than
/// the exact Student's t — adequate for the small sample sizes a
/// longitudinal study produces per subject.
fn ols(xs: &[f64], ys: &[f64]) -> OlsFit {
    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        sxx += (x - x_mean).powi(2);
        sxy += (x - x_mean) * (y - y_mean);
    }

    if sxx.abs() < f64::EPSILON {
        return OlsFit {
            slope: 0.0,
            r_squared: 0.0,
            p_value: 1.0,
        };
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let predicted = intercept + slope * x;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - y_mean).powi(2);
    }
    let r_squared = if ss_tot.abs() < f64::EPSILON {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    let p_value = if n > 2.0 && ss_tot.abs() > f64::EPSILON {
        let residual_variance = ss_res / (n - 2.0);
        let se_slope = (residual_variance / sxx).sqrt();
        if se_slope > f64::EPSILON {
            let z = (slope / se_slope).abs();
            2.0 * (1.0 - normal_cdf(z))
        } else {
            0.0
        }
    } else {
        1.0
    };

    OlsFit {
        slope,
        r_squared,
        p_value,
    }
}

fn classify_direction(metric: MetricKind, slope: f64, r_squared: f64, slope_epsilon: f64) -> TrendDirection {
    if slope.abs() < slope_epsilon || r_squared < 0.1 {
        return TrendDirection::Stable;
    }
    let improving = match metric.default_direction() {
        qcnorm_shared::Direction::HigherBetter => slope > 0.0,
        qcnorm_shared::Direction::LowerBetter => slope < 0.0,
    };
    if improving {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    }
}

/// Escalates a monotone classification to `Variable` when the series is
/// noisy relative to its own scale, even though OLS found a nonzero slope.
fn refine_for_variability(direction: TrendDirection, ys: &[f64], sigma_epsilon: f64) -> TrendDirection {
    if matches!(direction, TrendDirection::Stable) {
        return direction;
    }
    let mean = ys.iter().sum::<f64>() / ys.len() as f64;
    let variance = ys.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / ys.len() as f64;
    let sd = variance.sqrt();
    if mean.abs() > f64::EPSILON && sd / mean.abs() > sigma_epsilon {
        TrendDirection::Variable
    } else {
        direction
    }
}

fn age_group_transitions(timepoints: &[Timepoint]) -> Vec<AgeGroupTransition> {
    let mut transitions = Vec::new();
    let mut prev: Option<&Timepoint> = None;
    for tp in timepoints {
        if let Some(prev_tp) = prev {
            if let (Some(from), Some(to)) = (&prev_tp.age_group, &tp.age_group) {
                if from != to {
                    transitions.push(AgeGroupTransition {
                        from_group: from.clone(),
                        to_group: to.clone(),
                        at_days_from_baseline: tp.days_from_baseline,
                        timepoint_id: tp.timepoint_id.clone(),
                    });
                }
            }
        }
        prev = Some(tp);
    }
    transitions
}

fn quality_status_transitions(timepoints: &[Timepoint]) -> Vec<QualityStatusChange> {
    let mut transitions = Vec::new();
    let mut prev: Option<&Timepoint> = None;
    for tp in timepoints {
        if let Some(prev_tp) = prev {
            if prev_tp.overall_verdict != tp.overall_verdict {
                transitions.push(QualityStatusChange {
                    from_verdict: prev_tp.overall_verdict,
                    to_verdict: tp.overall_verdict,
                    at_days_from_baseline: tp.days_from_baseline,
                    timepoint_id: tp.timepoint_id.clone(),
                });
            }
        }
        prev = Some(tp);
    }
    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcnorm_shared::{Metrics, Verdict};

    fn tp(id: &str, days: f64, value: f64, age_group: &str, verdict: Verdict) -> Timepoint {
        Timepoint {
            timepoint_id: id.to_string(),
            session: None,
            days_from_baseline: days,
            age_at_scan: Some(20.0 + days / 365.0),
            age_group: Some(age_group.to_string()),
            raw_metrics: Metrics {
                snr: Some(value),
                ..Default::default()
            },
            overall_verdict: verdict,
        }
    }

    #[test]
    fn fewer_than_two_points_yields_stable_with_no_fit() {
        let mut subject = LongitudinalSubject::new("sub-01");
        subject.timepoints.push(tp("t0", 0.0, 50.0, "young_adult", Verdict::Pass));
        let engine = LongitudinalEngine::new(0.01, 0.5);
        let trend = engine.trend(&subject, MetricKind::Snr);
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.slope.is_none());
    }

    #[test]
    fn steadily_improving_snr_is_detected() {
        let mut subject = LongitudinalSubject::new("sub-01");
        for i in 0..5 {
            subject.timepoints.push(tp(
                &format!("t{i}"),
                i as f64 * 100.0,
                40.0 + i as f64 * 5.0,
                "young_adult",
                Verdict::Pass,
            ));
        }
        let engine = LongitudinalEngine::new(0.01, 10.0);
        let trend = engine.trend(&subject, MetricKind::Snr);
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert!(trend.slope.unwrap() > 0.0);
        assert!(trend.r_squared.unwrap() > 0.9);
    }

    #[test]
    fn flat_series_is_stable() {
        let mut subject = LongitudinalSubject::new("sub-01");
        for i in 0..5 {
            subject.timepoints.push(tp(&format!("t{i}"), i as f64 * 100.0, 50.0, "young_adult", Verdict::Pass));
        }
        let engine = LongitudinalEngine::new(0.01, 0.5);
        let trend = engine.trend(&subject, MetricKind::Snr);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn detects_age_group_and_quality_status_transitions() {
        let mut subject = LongitudinalSubject::new("sub-01");
        subject.timepoints.push(tp("t0", 0.0, 50.0, "adolescent", Verdict::Pass));
        subject.timepoints.push(tp("t1", 400.0, 48.0, "young_adult", Verdict::Warning));
        let engine = LongitudinalEngine::new(0.01, 0.5);
        let trend = engine.trend(&subject, MetricKind::Snr);
        assert_eq!(trend.age_group_changes.len(), 1);
        assert_eq!(trend.quality_status_changes.len(), 1);
    }
}
