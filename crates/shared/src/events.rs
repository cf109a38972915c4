use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};

/// Batch lifecycle and progress events.
///
/// A single `serde`-tagged enum carried over both the per-batch `broadcast`
/// channel and the global dashboard topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BatchEvent {
    BatchStarted {
        batch_id: String,
        total: usize,
    },
    BatchProgress {
        batch_id: String,
        completed: usize,
        failed: usize,
        total: usize,
        percent: f64,
    },
    SubjectProcessed {
        batch_id: String,
        subject_id: String,
        row_index: usize,
        verdict: Verdict,
    },
    ProcessingErrorEvent {
        batch_id: String,
        row_index: usize,
        code: String,
        message: String,
        field: Option<String>,
    },
    BatchCompleted {
        batch_id: String,
        completed: usize,
        failed: usize,
        elapsed_ms: u64,
    },
    BatchFailed {
        batch_id: String,
        completed: usize,
        failed: usize,
        elapsed_ms: u64,
    },
    BatchCancelled {
        batch_id: String,
        completed: usize,
        failed: usize,
        elapsed_ms: u64,
    },
    /// Emitted in place of a dropped event when a subscriber's bounded
    /// buffer overflows.
    BackpressureWarning {
        topic: String,
        dropped: u64,
    },
}

impl BatchEvent {
    #[must_use]
    pub fn batch_id(&self) -> Option<&str> {
        match self {
            BatchEvent::BatchStarted { batch_id, .. }
            | BatchEvent::BatchProgress { batch_id, .. }
            | BatchEvent::SubjectProcessed { batch_id, .. }
            | BatchEvent::ProcessingErrorEvent { batch_id, .. }
            | BatchEvent::BatchCompleted { batch_id, .. }
            | BatchEvent::BatchFailed { batch_id, .. }
            | BatchEvent::BatchCancelled { batch_id, .. } => Some(batch_id),
            BatchEvent::BackpressureWarning { .. } => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchEvent::BatchCompleted { .. }
                | BatchEvent::BatchFailed { .. }
                | BatchEvent::BatchCancelled { .. }
        )
    }
}
