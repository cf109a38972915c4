use crate::metrics::MetricKind;
use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-metric normalization result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedValue {
    pub percentile: f64,
    pub z_score: f64,
    /// Set when `|z_score| > 50`: the value is far enough outside the
    /// normative distribution that it is more likely a unit mismatch or
    /// data-entry error than a genuine extreme subject.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMetrics {
    pub age_group: String,
    pub dataset_name: String,
    pub values: BTreeMap<MetricKind, NormalizedValue>,
}

/// One `QualityAssessment.violations` entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Violation {
    pub value: f64,
    pub crossed_threshold: f64,
    pub severity: Verdict,
}

/// Overall and per-metric verdicts plus the composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub overall: Verdict,
    pub per_metric: BTreeMap<MetricKind, Verdict>,
    pub composite: f64,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub flags: BTreeSet<String>,
    pub violations: BTreeMap<MetricKind, Violation>,
}
