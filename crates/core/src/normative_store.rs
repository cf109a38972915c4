//! Normative reference data: read-mostly lookup tables loaded
//! once from CSV/JSON, served from memory. A study-triggered reconfiguration
//! swaps in a new `Arc<NormativeDataset>` under a
//! `std::sync::RwLock` rather than mutating records in place, so readers
//! never observe a half-updated table.

use qcnorm_shared::{AgeGroup, Direction, MetricKind, NormativeRecord, QcError, QcResult, Threshold};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::{Arc, RwLock};

/// One named normative reference: its age-group partition plus the
/// per-(age_group, metric) normative records and default thresholds.
#[derive(Debug, Clone)]
pub struct NormativeDataset {
    pub name: String,
    pub age_groups: Vec<AgeGroup>,
    records: BTreeMap<(String, String), NormativeRecord>,
    thresholds: BTreeMap<(String, String), Threshold>,
}

impl NormativeDataset {
    pub fn new(name: impl Into<String>, age_groups: Vec<AgeGroup>) -> QcResult<Self> {
        qcnorm_shared::validate_age_groups(&age_groups)
            .map_err(QcError::ConfigInvalid)?;
        Ok(Self {
            name: name.into(),
            age_groups,
            records: BTreeMap::new(),
            thresholds: BTreeMap::new(),
        })
    }

    pub fn insert_record(&mut self, age_group: &str, record: NormativeRecord) {
        self.records
            .insert((age_group.to_string(), record.metric.column_name().to_string()), record);
    }

    pub fn insert_threshold(&mut self, age_group: &str, threshold: Threshold) {
        self.thresholds.insert(
            (age_group.to_string(), threshold.metric.column_name().to_string()),
            threshold,
        );
    }

    #[must_use]
    pub fn record(&self, age_group: &str, metric: qcnorm_shared::MetricKind) -> Option<&NormativeRecord> {
        self.records.get(&(age_group.to_string(), metric.column_name().to_string()))
    }

    #[must_use]
    pub fn threshold(&self, age_group: &str, metric: qcnorm_shared::MetricKind) -> Option<&Threshold> {
        self.thresholds
            .get(&(age_group.to_string(), metric.column_name().to_string()))
    }

    /// Parses a one-shot CSV load: one row per `(age_group, metric)` with
    /// columns `age_group,metric,mean,sd,p5,p25,p50,p75,p95,n` and,
    /// optionally, `warn,fail,direction` to also register a threshold for
    /// that row. Age groups are the engine defaults unless a row's
    /// `age_group` introduces one this dataset hasn't seen, in which case
    /// a wide `[0, 120]` placeholder group is registered for it — callers
    /// that need exact boundaries should call `NormativeDataset::new` with
    /// an explicit age-group list instead.
    pub fn from_csv<R: Read>(name: impl Into<String>, reader: R) -> QcResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|e| QcError::Schema(format!("failed to read normative CSV header: {e}")))?
            .clone();

        let mut dataset = Self::new(name, qcnorm_shared::default_age_groups())?;
        let mut seen_groups: std::collections::HashSet<String> =
            dataset.age_groups.iter().map(|g| g.name.clone()).collect();

        for (i, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| QcError::Schema(format!("malformed normative CSV row {i}: {e}")))?;
            let get = |col: &str| -> Option<&str> {
                headers.iter().position(|h| h == col).and_then(|idx| record.get(idx))
            };
            let parse_f64 = |col: &str| -> QcResult<f64> {
                get(col)
                    .ok_or_else(|| QcError::Schema(format!("normative CSV row {i} missing column '{col}'")))?
                    .parse()
                    .map_err(|_| QcError::Schema(format!("normative CSV row {i}: '{col}' is not a number")))
            };

            let age_group = get("age_group")
                .ok_or_else(|| QcError::Schema(format!("normative CSV row {i} missing 'age_group'")))?
                .to_string();
            let metric = MetricKind::from_column_name(
                get("metric").ok_or_else(|| QcError::Schema(format!("normative CSV row {i} missing 'metric'")))?,
            )
            .ok_or_else(|| QcError::Schema(format!("normative CSV row {i}: unknown metric")))?;

            if !seen_groups.contains(&age_group) {
                dataset.age_groups.push(AgeGroup::new(age_group.clone(), 0.0, 120.0));
                seen_groups.insert(age_group.clone());
            }

            dataset.insert_record(
                &age_group,
                NormativeRecord {
                    metric,
                    mean: parse_f64("mean")?,
                    sd: parse_f64("sd")?,
                    p5: parse_f64("p5")?,
                    p25: parse_f64("p25")?,
                    p50: parse_f64("p50")?,
                    p75: parse_f64("p75")?,
                    p95: parse_f64("p95")?,
                    sample_size: parse_f64("n")? as u32,
                },
            );

            if let (Some(warn), Some(fail)) = (get("warn"), get("fail")) {
                let direction = match get("direction") {
                    Some("higher_better") => Direction::HigherBetter,
                    _ => Direction::LowerBetter,
                };
                let threshold = Threshold {
                    metric,
                    warn: warn.parse().map_err(|_| QcError::Schema(format!("normative CSV row {i}: 'warn' is not a number")))?,
                    fail: fail.parse().map_err(|_| QcError::Schema(format!("normative CSV row {i}: 'fail' is not a number")))?,
                    direction,
                };
                threshold.validate().map_err(QcError::Schema)?;
                dataset.insert_threshold(&age_group, threshold);
            }
        }
        Ok(dataset)
    }

    /// Parses a JSON `{ "name", "age_groups": [...], "records": [...],
    /// "thresholds": [...] }` document into a dataset.
    pub fn from_json<R: Read>(mut reader: R) -> QcResult<Self> {
        #[derive(serde::Deserialize)]
        struct RecordEntry {
            age_group: String,
            #[serde(flatten)]
            record: NormativeRecord,
        }
        #[derive(serde::Deserialize)]
        struct ThresholdEntry {
            age_group: String,
            #[serde(flatten)]
            threshold: Threshold,
        }
        #[derive(serde::Deserialize)]
        struct Document {
            name: String,
            age_groups: Vec<AgeGroup>,
            records: Vec<RecordEntry>,
            #[serde(default)]
            thresholds: Vec<ThresholdEntry>,
        }

        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| QcError::Schema(format!("failed to read normative JSON: {e}")))?;
        let doc: Document = serde_json::from_str(&text)
            .map_err(|e| QcError::Schema(format!("failed to parse normative JSON: {e}")))?;

        let mut dataset = Self::new(doc.name, doc.age_groups)?;
        for entry in doc.records {
            dataset.insert_record(&entry.age_group, entry.record);
        }
        for entry in doc.thresholds {
            entry.threshold.validate().map_err(QcError::Schema)?;
            dataset.insert_threshold(&entry.age_group, entry.threshold);
        }
        Ok(dataset)
    }
}

/// A plausible normative record for `metric`, centered on its sane range.
/// Used to seed an illustrative dataset when no real normative data is
/// configured — not a substitute for an actual reference sample.
#[must_use]
pub fn illustrative_record(metric: MetricKind) -> NormativeRecord {
    let (lo, hi) = metric.sane_range();
    let lo = if lo.is_finite() { lo } else { 0.0 };
    let hi = if hi.is_finite() { hi } else { lo + 100.0 };
    let mean = lo + (hi - lo) * 0.5;
    let sd = ((hi - lo) * 0.15).max(0.01);
    NormativeRecord {
        metric,
        mean,
        sd,
        p5: mean - 1.645 * sd,
        p25: mean - 0.674 * sd,
        p50: mean,
        p75: mean + 0.674 * sd,
        p95: mean + 1.645 * sd,
        sample_size: 250,
    }
}

/// Registry of named normative datasets, keyed by dataset name
/// (`StudyConfiguration::normative_dataset` references one of these).
#[derive(Default)]
pub struct NormativeStore {
    datasets: RwLock<Arc<HashMap<String, Arc<NormativeDataset>>>>,
}

impl NormativeStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            datasets: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Copy-on-write registration: clones the current map, inserts, and
    /// swaps the whole `Arc` so in-flight readers keep their old snapshot.
    pub fn register(&self, dataset: NormativeDataset) {
        let mut guard = self.datasets.write().expect("normative store lock poisoned");
        let mut next = (**guard).clone();
        next.insert(dataset.name.clone(), Arc::new(dataset));
        *guard = Arc::new(next);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<NormativeDataset>> {
        self.datasets
            .read()
            .expect("normative store lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn require(&self, name: &str) -> QcResult<Arc<NormativeDataset>> {
        self.get(name)
            .ok_or_else(|| QcError::NotFound(format!("normative dataset '{name}'")))
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.datasets
            .read()
            .expect("normative store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcnorm_shared::MetricKind;

    fn sample_record(metric: MetricKind) -> NormativeRecord {
        NormativeRecord {
            metric,
            mean: 50.0,
            sd: 5.0,
            p5: 40.0,
            p25: 46.0,
            p50: 50.0,
            p75: 54.0,
            p95: 60.0,
            sample_size: 100,
        }
    }

    #[test]
    fn register_then_get_roundtrips() {
        let store = NormativeStore::new();
        let mut ds = NormativeDataset::new("default", qcnorm_shared::default_age_groups()).unwrap();
        ds.insert_record("young_adult", sample_record(MetricKind::Snr));
        store.register(ds);

        let fetched = store.require("default").unwrap();
        assert!(fetched.record("young_adult", MetricKind::Snr).is_some());
        assert!(fetched.record("elderly", MetricKind::Snr).is_none());
    }

    #[test]
    fn unknown_dataset_is_not_found() {
        let store = NormativeStore::new();
        assert!(store.require("nope").is_err());
    }

    #[test]
    fn invalid_age_groups_rejected_at_construction() {
        let bad = vec![AgeGroup::new("a", 10.0, 5.0)];
        assert!(NormativeDataset::new("bad", bad).is_err());
    }

    #[test]
    fn loads_from_csv_with_threshold_columns() {
        let csv = "age_group,metric,mean,sd,p5,p25,p50,p75,p95,n,warn,fail,direction\n\
                    young_adult,snr,50,10,30,42,50,58,70,500,12,8,higher_better\n";
        let dataset = NormativeDataset::from_csv("default", csv.as_bytes()).unwrap();
        assert!(dataset.record("young_adult", MetricKind::Snr).is_some());
        let threshold = dataset.threshold("young_adult", MetricKind::Snr).unwrap();
        assert_eq!(threshold.warn, 12.0);
        assert_eq!(threshold.direction, Direction::HigherBetter);
    }

    #[test]
    fn csv_load_introduces_unknown_age_groups_as_wide_placeholders() {
        let csv = "age_group,metric,mean,sd,p5,p25,p50,p75,p95,n\n\
                    custom_cohort,snr,50,10,30,42,50,58,70,500\n";
        let dataset = NormativeDataset::from_csv("default", csv.as_bytes()).unwrap();
        assert!(dataset.age_groups.iter().any(|g| g.name == "custom_cohort"));
        assert!(dataset.record("custom_cohort", MetricKind::Snr).is_some());
    }

    #[test]
    fn loads_from_json() {
        let json = serde_json::json!({
            "name": "default",
            "age_groups": [{"name": "young_adult", "min_age": 18.0, "max_age": 35.0, "description": null}],
            "records": [
                {"age_group": "young_adult", "metric": "Snr", "mean": 50.0, "sd": 10.0, "p5": 30.0, "p25": 42.0, "p50": 50.0, "p75": 58.0, "p95": 70.0, "sample_size": 500}
            ],
            "thresholds": []
        });
        let dataset = NormativeDataset::from_json(json.to_string().as_bytes()).unwrap();
        assert!(dataset.record("young_adult", MetricKind::Snr).is_some());
    }
}
