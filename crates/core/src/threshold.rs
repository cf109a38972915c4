//! Threshold resolution and default threshold policy.
//!
//! Age-group/study overrides take precedence over a dataset's baked-in
//! defaults, which in turn take precedence over the engine-wide fallback
//! produced by [`default_thresholds`].

use qcnorm_shared::{Direction, MetricKind, Threshold};

/// Engine-wide illustrative defaults, used only when neither the active
/// normative dataset nor a study configuration supplies a threshold for a
/// metric. Values are hand-set per metric rather than derived from
/// `MetricKind::sane_range` — `gsr_x`/`gsr_y` have unbounded sane ranges,
/// which would break any percentage-of-span formula.
#[must_use]
pub fn default_thresholds() -> Vec<Threshold> {
    use MetricKind::*;
    vec![
        Threshold { metric: Snr, warn: 12.0, fail: 8.0, direction: Direction::HigherBetter },
        Threshold { metric: Cnr, warn: 2.0, fail: 1.0, direction: Direction::HigherBetter },
        Threshold { metric: Fber, warn: 1000.0, fail: 200.0, direction: Direction::HigherBetter },
        Threshold { metric: Efc, warn: 0.5, fail: 0.7, direction: Direction::LowerBetter },
        Threshold { metric: FwhmAvg, warn: 4.0, fail: 6.0, direction: Direction::LowerBetter },
        Threshold { metric: FwhmX, warn: 4.0, fail: 6.0, direction: Direction::LowerBetter },
        Threshold { metric: FwhmY, warn: 4.0, fail: 6.0, direction: Direction::LowerBetter },
        Threshold { metric: FwhmZ, warn: 4.0, fail: 6.0, direction: Direction::LowerBetter },
        Threshold { metric: Qi1, warn: 0.02, fail: 0.05, direction: Direction::LowerBetter },
        Threshold { metric: Qi2, warn: 0.02, fail: 0.05, direction: Direction::LowerBetter },
        Threshold { metric: Cjv, warn: 0.6, fail: 1.0, direction: Direction::LowerBetter },
        Threshold { metric: Wm2max, warn: 0.7, fail: 0.5, direction: Direction::HigherBetter },
        Threshold { metric: Dvars, warn: 1.5, fail: 2.5, direction: Direction::LowerBetter },
        Threshold { metric: FdMean, warn: 0.2, fail: 0.5, direction: Direction::LowerBetter },
        Threshold { metric: FdNum, warn: 20.0, fail: 50.0, direction: Direction::LowerBetter },
        Threshold { metric: FdPerc, warn: 10.0, fail: 25.0, direction: Direction::LowerBetter },
        Threshold { metric: Gcor, warn: 0.3, fail: 0.6, direction: Direction::LowerBetter },
        Threshold { metric: GsrX, warn: 0.1, fail: 0.2, direction: Direction::LowerBetter },
        Threshold { metric: GsrY, warn: 0.1, fail: 0.2, direction: Direction::LowerBetter },
        Threshold { metric: OutlierFraction, warn: 0.1, fail: 0.25, direction: Direction::LowerBetter },
    ]
}

/// Resolves the effective threshold for `metric`, checking `overrides`
/// first, falling back to the dataset's age-group-specific policy, and
/// finally to the engine-wide default.
pub struct ThresholdResolver<'a> {
    overrides: &'a [Threshold],
    defaults: Vec<Threshold>,
}

impl<'a> ThresholdResolver<'a> {
    #[must_use]
    pub fn new(overrides: &'a [Threshold]) -> Self {
        Self {
            overrides,
            defaults: default_thresholds(),
        }
    }

    #[must_use]
    pub fn resolve(
        &self,
        metric: MetricKind,
        dataset: &crate::normative_store::NormativeDataset,
        age_group: &str,
    ) -> Option<Threshold> {
        if let Some(t) = self.overrides.iter().find(|t| t.metric == metric) {
            return Some(*t);
        }
        if let Some(t) = dataset.threshold(age_group, metric) {
            return Some(*t);
        }
        self.defaults.iter().find(|t| t.metric == metric).copied()
    }
}
