use crate::metrics::{Metrics, MetricKind};
use crate::subject::Sex;
use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};

/// One processed scan session of one subject at a moment in time
/// (one visit in a subject's longitudinal record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timepoint {
    pub timepoint_id: String,
    pub session: Option<String>,
    pub days_from_baseline: f64,
    pub age_at_scan: Option<f64>,
    pub age_group: Option<String>,
    pub raw_metrics: Metrics,
    pub overall_verdict: Verdict,
}

/// One subject's full history of timepoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongitudinalSubject {
    pub subject_id: String,
    pub baseline_age: Option<f64>,
    pub sex: Option<Sex>,
    pub study: Option<String>,
    /// Ordered by `days_from_baseline`.
    pub timepoints: Vec<Timepoint>,
}

impl LongitudinalSubject {
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            baseline_age: None,
            sex: None,
            study: None,
            timepoints: Vec::new(),
        }
    }

    /// Inserts `timepoint`, keeping `timepoints` ordered by
    /// `days_from_baseline`. A timepoint sharing a session with an existing
    /// one replaces it in place rather than appending — two calls with the
    /// same `session` leave the subject in the same state as the later
    /// call alone. Timepoints with no session are matched by
    /// `timepoint_id` instead.
    pub fn add_timepoint(&mut self, timepoint: Timepoint) {
        let existing = self.timepoints.iter().position(|tp| match (&tp.session, &timepoint.session) {
            (Some(a), Some(b)) => a == b,
            _ => tp.timepoint_id == timepoint.timepoint_id,
        });
        match existing {
            Some(i) => self.timepoints[i] = timepoint,
            None => self.timepoints.push(timepoint),
        }
        self.timepoints.sort_by(|a, b| a.days_from_baseline.total_cmp(&b.days_from_baseline));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    Variable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendPoint {
    pub value: f64,
    pub days_from_baseline: f64,
    pub age_at_scan: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeGroupTransition {
    pub from_group: String,
    pub to_group: String,
    pub at_days_from_baseline: f64,
    pub timepoint_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityStatusChange {
    pub from_verdict: Verdict,
    pub to_verdict: Verdict,
    pub at_days_from_baseline: f64,
    pub timepoint_id: String,
}

/// The computed trend for one metric across a subject's timepoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub subject_id: String,
    pub metric: MetricKind,
    pub direction: TrendDirection,
    pub slope: Option<f64>,
    pub r_squared: Option<f64>,
    pub p_value: Option<f64>,
    pub values_over_time: Vec<(String, TrendPoint)>,
    pub age_group_changes: Vec<AgeGroupTransition>,
    pub quality_status_changes: Vec<QualityStatusChange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(id: &str, session: Option<&str>, days: f64, value: f64) -> Timepoint {
        Timepoint {
            timepoint_id: id.to_string(),
            session: session.map(str::to_string),
            days_from_baseline: days,
            age_at_scan: None,
            age_group: None,
            raw_metrics: Metrics {
                snr: Some(value),
                ..Default::default()
            },
            overall_verdict: Verdict::Pass,
        }
    }

    #[test]
    fn adding_same_session_replaces_rather_than_appends() {
        let mut subject = LongitudinalSubject::new("sub-01");
        subject.add_timepoint(tp("t0", Some("ses-1"), 0.0, 10.0));
        subject.add_timepoint(tp("t0-corrected", Some("ses-1"), 0.0, 99.0));

        assert_eq!(subject.timepoints.len(), 1);
        assert_eq!(subject.timepoints[0].timepoint_id, "t0-corrected");
        assert_eq!(subject.timepoints[0].raw_metrics.snr, Some(99.0));
    }

    #[test]
    fn adding_distinct_sessions_appends() {
        let mut subject = LongitudinalSubject::new("sub-01");
        subject.add_timepoint(tp("t0", Some("ses-1"), 0.0, 10.0));
        subject.add_timepoint(tp("t1", Some("ses-2"), 180.0, 11.0));
        assert_eq!(subject.timepoints.len(), 2);
    }

    #[test]
    fn insertion_keeps_chronological_order() {
        let mut subject = LongitudinalSubject::new("sub-01");
        subject.add_timepoint(tp("t1", Some("ses-2"), 180.0, 11.0));
        subject.add_timepoint(tp("t0", Some("ses-1"), 0.0, 10.0));
        let days: Vec<f64> = subject.timepoints.iter().map(|t| t.days_from_baseline).collect();
        assert_eq!(days, vec![0.0, 180.0]);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn tp(id: String, session: String, days: f64, value: f64) -> Timepoint {
        Timepoint {
            timepoint_id: id,
            session: Some(session),
            days_from_baseline: days,
            age_at_scan: None,
            age_group: None,
            raw_metrics: Metrics {
                snr: Some(value),
                ..Default::default()
            },
            overall_verdict: Verdict::Pass,
        }
    }

    proptest! {
        /// Adding two timepoints that share a session leaves the subject
        /// exactly as if only the second call had happened.
        #[test]
        fn repeated_add_same_session_is_idempotent(
            days_a in -100.0..1000.0f64,
            value_a in -100.0..1000.0f64,
            days_b in -100.0..1000.0f64,
            value_b in -100.0..1000.0f64,
        ) {
            let mut twice = LongitudinalSubject::new("sub-01");
            twice.add_timepoint(tp("t-a".to_string(), "ses-1".to_string(), days_a, value_a));
            twice.add_timepoint(tp("t-b".to_string(), "ses-1".to_string(), days_b, value_b));

            let mut once = LongitudinalSubject::new("sub-01");
            once.add_timepoint(tp("t-b".to_string(), "ses-1".to_string(), days_b, value_b));

            prop_assert_eq!(twice.timepoints.len(), once.timepoints.len());
            prop_assert_eq!(twice.timepoints[0].timepoint_id.clone(), once.timepoints[0].timepoint_id.clone());
            prop_assert_eq!(twice.timepoints[0].days_from_baseline, once.timepoints[0].days_from_baseline);
            prop_assert_eq!(twice.timepoints[0].raw_metrics.snr, once.timepoints[0].raw_metrics.snr);
        }
    }
}
