//! Age-normed QC pipeline core: normative lookup, age classification,
//! percentile/z-score normalization, threshold-driven assessment, CSV
//! ingest/export, worker-pool batch orchestration, a broadcast event bus,
//! longitudinal trend analysis, and study configuration persistence.

pub mod age_classifier;
pub mod assessor;
pub mod config;
pub mod event_bus;
pub mod export;
pub mod ingest;
pub mod longitudinal;
pub mod normalizer;
pub mod normative_store;
pub mod orchestrator;
pub mod stats;
pub mod study_store;
pub mod threshold;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use age_classifier::AgeClassifier;
pub use assessor::Assessor;
pub use config::EngineConfig;
pub use event_bus::{EventBus, EventSubscriber};
pub use export::{
    CsvExporter, DocumentModel, ExportOptions, NullRenderer, PlainTextRenderer, Renderer,
    ReportSummary,
};
pub use ingest::{CsvIngester, IngestedRow};
pub use longitudinal::LongitudinalEngine;
pub use normalizer::Normalizer;
pub use normative_store::{NormativeDataset, NormativeStore};
pub use orchestrator::BatchOrchestrator;
pub use study_store::{CreateStudyRequest, StudyConfigStore, UpdateStudyRequest};
pub use threshold::{default_thresholds, ThresholdResolver};
