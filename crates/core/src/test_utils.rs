//! Shared test fixtures, used across this crate's unit tests and
//! integration tests in `qcnorm-cli`.

use crate::event_bus::EventBus;
use crate::normative_store::{illustrative_record, NormativeDataset, NormativeStore};
use std::sync::Arc;

/// A normative store preloaded with a single "default" dataset carrying
/// plausible anchors for every vocabulary metric across every default age
/// group, so processing-pipeline tests never hit `NoNormative`.
#[must_use]
pub fn sample_normative_store() -> Arc<NormativeStore> {
    let store = NormativeStore::new();
    let mut dataset = NormativeDataset::new("default", qcnorm_shared::default_age_groups()).unwrap();
    for group in qcnorm_shared::default_age_groups() {
        for metric in qcnorm_shared::METRIC_VOCABULARY {
            dataset.insert_record(&group.name, illustrative_record(metric));
        }
    }
    store.register(dataset);
    Arc::new(store)
}

#[must_use]
pub fn sample_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::new(64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_store_covers_every_default_group_and_metric() {
        let store = sample_normative_store();
        let dataset = store.require("default").unwrap();
        for group in qcnorm_shared::default_age_groups() {
            for metric in qcnorm_shared::METRIC_VOCABULARY {
                assert!(dataset.record(&group.name, metric).is_some());
            }
        }
    }
}
