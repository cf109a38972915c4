//! Shared data model, event payloads, and error taxonomy for the
//! age-normed QC engine. No I/O lives here; every type is plain data.

pub mod assessment;
pub mod batch;
pub mod error;
pub mod events;
pub mod longitudinal;
pub mod metrics;
pub mod normative;
pub mod study;
pub mod subject;
pub mod verdict;

pub use assessment::{NormalizedMetrics, NormalizedValue, QualityAssessment, Violation};
pub use batch::{BatchConfig, BatchState, BatchStatus, ProcessedSubject, ProcessingError, Progress};
pub use error::{QcError, QcResult};
pub use events::BatchEvent;
pub use longitudinal::{
    AgeGroupTransition, LongitudinalSubject, QualityStatusChange, Timepoint, Trend,
    TrendDirection, TrendPoint,
};
pub use metrics::{Direction, MetricKind, Metrics, METRIC_VOCABULARY};
pub use normative::{default_age_groups, validate_age_groups, AgeGroup, NormativeRecord, Threshold};
pub use study::StudyConfiguration;
pub use subject::{ScanType, Sex, SubjectInfo};
pub use verdict::Verdict;
