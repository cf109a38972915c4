use crate::assessment::QualityAssessment;
use crate::error::QcError;
use crate::metrics::Metrics;
use crate::subject::SubjectInfo;
use crate::NormalizedMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fully processed subject: raw input, optional normalization, and
/// its quality assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedSubject {
    pub subject_info: SubjectInfo,
    pub raw_metrics: Metrics,
    pub normalized_metrics: Option<NormalizedMetrics>,
    pub assessment: QualityAssessment,
    pub processing_timestamp: DateTime<Utc>,
    pub processing_version: String,
    pub row_index: usize,
}

/// A row-level failure, captured in `BatchState.errors` and mirrored into a
/// `processing_error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingError {
    pub row_index: usize,
    pub field: Option<String>,
    pub code: String,
    pub message: String,
}

impl ProcessingError {
    #[must_use]
    pub fn from_qc_error(row_index: usize, err: &QcError) -> Self {
        let field = match err {
            QcError::Row { field, .. } => field.clone(),
            _ => None,
        };
        Self {
            row_index,
            field,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub percent: f64,
}

impl Progress {
    #[must_use]
    pub fn recompute_percent(mut self) -> Self {
        self.percent = if self.total == 0 {
            0.0
        } else {
            100.0 * (self.completed + self.failed) as f64 / self.total as f64
        };
        self
    }
}

/// Summary of an in-flight or completed batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchState {
    pub batch_id: String,
    pub status: BatchStatus,
    pub progress: Progress,
    pub errors: Vec<ProcessingError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchState {
    #[must_use]
    pub fn new(batch_id: impl Into<String>, total: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            status: BatchStatus::Pending,
            progress: Progress {
                completed: 0,
                failed: 0,
                total,
                percent: 0.0,
            },
            errors: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Per-run toggles for normalization and assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub apply_assessment: bool,
    pub apply_normalization: bool,
    pub study: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            apply_assessment: true,
            apply_normalization: true,
            study: None,
        }
    }
}
