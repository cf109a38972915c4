//! Age-to-age-group classification, cached at 0.01-year
//! resolution via `dashmap` since batches re-classify the same ages often
//! within a study's narrow intake window.

use dashmap::DashMap;
use qcnorm_shared::{validate_age_groups, AgeGroup, QcError, QcResult};

/// Bucket an age to hundredths of a year for cache keying.
fn bucket(age: f64) -> i64 {
    (age * 100.0).round() as i64
}

pub struct AgeClassifier {
    groups: Vec<AgeGroup>,
    cache: DashMap<i64, Option<String>>,
}

impl AgeClassifier {
    pub fn new(groups: Vec<AgeGroup>) -> QcResult<Self> {
        validate_age_groups(&groups).map_err(QcError::ConfigInvalid)?;
        Ok(Self {
            groups,
            cache: DashMap::new(),
        })
    }

    /// Returns the matching age group's name, or `None` if `age` falls
    /// below the lowest group's `min_age` or above the highest group's
    /// `max_age` (out-of-range age yields no age group, not an error).
    ///
    /// Groups are walked in ascending `min_age` order and matched
    /// half-open against the *next* group's start, so an age that would
    /// otherwise fall in the gap left by two inclusive bounds (e.g. an
    /// age of 17.5 between `adolescent` [13,17] and `young_adult`
    /// [18,35]) still resolves to the lower group — there is no interior
    /// gap, only the floor below the first group and the ceiling above
    /// the last.
    #[must_use]
    pub fn classify(&self, age: f64) -> Option<String> {
        let key = bucket(age);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let mut sorted: Vec<&AgeGroup> = self.groups.iter().collect();
        sorted.sort_by(|a, b| a.min_age.partial_cmp(&b.min_age).unwrap());
        let found = sorted
            .iter()
            .enumerate()
            .find(|(i, g)| {
                age >= g.min_age
                    && sorted
                        .get(i + 1)
                        .map_or(age <= g.max_age, |next| age < next.min_age)
            })
            .map(|(_, g)| g.name.clone());
        self.cache.insert(key, found.clone());
        found
    }

    #[must_use]
    pub fn groups(&self) -> &[AgeGroup] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_within_default_groups() {
        let classifier = AgeClassifier::new(qcnorm_shared::default_age_groups()).unwrap();
        assert_eq!(classifier.classify(8.0).as_deref(), Some("pediatric"));
        assert_eq!(classifier.classify(25.0).as_deref(), Some("young_adult"));
        assert_eq!(classifier.classify(70.0).as_deref(), Some("elderly"));
    }

    #[test]
    fn fractional_ages_between_inclusive_bounds_still_classify() {
        let classifier = AgeClassifier::new(qcnorm_shared::default_age_groups()).unwrap();
        assert_eq!(classifier.classify(12.5).as_deref(), Some("pediatric"));
        assert_eq!(classifier.classify(17.5).as_deref(), Some("adolescent"));
        assert_eq!(classifier.classify(35.5).as_deref(), Some("young_adult"));
        assert_eq!(classifier.classify(65.5).as_deref(), Some("middle_age"));
    }

    #[test]
    fn out_of_range_age_yields_none() {
        let classifier = AgeClassifier::new(qcnorm_shared::default_age_groups()).unwrap();
        assert_eq!(classifier.classify(2.0), None);
        assert_eq!(classifier.classify(150.0), None);
    }

    #[test]
    fn repeated_lookup_hits_cache() {
        let classifier = AgeClassifier::new(qcnorm_shared::default_age_groups()).unwrap();
        assert_eq!(classifier.classify(25.001), classifier.classify(25.004));
        assert_eq!(classifier.cache.len(), 1);
    }

    #[test]
    fn invalid_groups_rejected() {
        let groups = vec![AgeGroup::new("a", 10.0, 5.0)];
        assert!(AgeClassifier::new(groups).is_err());
    }
}
