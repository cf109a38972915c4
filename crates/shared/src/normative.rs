use crate::metrics::{Direction, MetricKind};
use serde::{Deserialize, Serialize};

/// A named age bracket. `min_age`/`max_age` are both inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeGroup {
    pub name: String,
    pub min_age: f64,
    pub max_age: f64,
    pub description: Option<String>,
}

impl AgeGroup {
    #[must_use]
    pub fn new(name: impl Into<String>, min_age: f64, max_age: f64) -> Self {
        Self {
            name: name.into(),
            min_age,
            max_age,
            description: None,
        }
    }

    #[must_use]
    pub fn contains(&self, age: f64) -> bool {
        age >= self.min_age && age <= self.max_age
    }
}

/// Default age-group set: pediatric, adolescent, young_adult,
/// middle_age, elderly.
#[must_use]
pub fn default_age_groups() -> Vec<AgeGroup> {
    vec![
        AgeGroup::new("pediatric", 6.0, 12.0),
        AgeGroup::new("adolescent", 13.0, 17.0),
        AgeGroup::new("young_adult", 18.0, 35.0),
        AgeGroup::new("middle_age", 36.0, 65.0),
        AgeGroup::new("elderly", 66.0, 100.0),
    ]
}

/// Validate the invariant shared across any effective age-group set:
/// `min < max` and pairwise non-overlap once sorted by `min_age`.
pub fn validate_age_groups(groups: &[AgeGroup]) -> Result<(), String> {
    for g in groups {
        if !(g.min_age < g.max_age) {
            return Err(format!(
                "age group '{}' has min_age ({}) >= max_age ({})",
                g.name, g.min_age, g.max_age
            ));
        }
    }
    let mut sorted: Vec<&AgeGroup> = groups.iter().collect();
    sorted.sort_by(|a, b| a.min_age.partial_cmp(&b.min_age).unwrap());
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.max_age >= b.min_age {
            return Err(format!(
                "age groups '{}' [{}, {}] and '{}' [{}, {}] overlap",
                a.name, a.min_age, a.max_age, b.name, b.min_age, b.max_age
            ));
        }
    }
    Ok(())
}

/// Mean/SD and percentile anchors for one metric within one age group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormativeRecord {
    pub metric: MetricKind,
    pub mean: f64,
    pub sd: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub sample_size: u32,
}

/// Warn/fail cutoffs and pass/fail direction for one metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Threshold {
    pub metric: MetricKind,
    pub warn: f64,
    pub fail: f64,
    pub direction: Direction,
}

impl Threshold {
    /// Invariant: `higher_better ⇒ warn > fail`; `lower_better ⇒ warn < fail`.
    pub fn validate(&self) -> Result<(), String> {
        match self.direction {
            Direction::HigherBetter if self.warn <= self.fail => Err(format!(
                "threshold for {} is higher_better but warn ({}) <= fail ({})",
                self.metric, self.warn, self.fail
            )),
            Direction::LowerBetter if self.warn >= self.fail => Err(format!(
                "threshold for {} is lower_better but warn ({}) >= fail ({})",
                self.metric, self.warn, self.fail
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_groups_are_valid() {
        assert!(validate_age_groups(&default_age_groups()).is_ok());
    }

    #[test]
    fn overlapping_groups_rejected() {
        let groups = vec![
            AgeGroup::new("a", 0.0, 10.0),
            AgeGroup::new("b", 10.0, 20.0),
        ];
        assert!(validate_age_groups(&groups).is_err());
    }

    #[test]
    fn inverted_min_max_rejected() {
        let groups = vec![AgeGroup::new("a", 20.0, 10.0)];
        assert!(validate_age_groups(&groups).is_err());
    }

    #[test]
    fn threshold_direction_invariant() {
        let higher = Threshold {
            metric: MetricKind::Snr,
            warn: 10.0,
            fail: 8.0,
            direction: Direction::HigherBetter,
        };
        assert!(higher.validate().is_ok());

        let bad = Threshold {
            metric: MetricKind::Snr,
            warn: 8.0,
            fail: 10.0,
            direction: Direction::HigherBetter,
        };
        assert!(bad.validate().is_err());
    }
}
