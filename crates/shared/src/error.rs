use serde::{Deserialize, Serialize};

/// Crate-wide error taxonomy.
///
/// A single `thiserror` enum, tagged for serialization so it can travel
/// across the CLI/event boundary unchanged.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum QcError {
    /// validation/schema: bad header, missing required column, non-UTF-8 bytes.
    #[error("schema error: {0}")]
    Schema(String),

    /// validation/row: bad subject_id, out-of-range metric, cross-field inconsistency.
    #[error("row {row_index} error{}: {reason}", field.as_ref().map(|f| format!(" in field '{f}'")).unwrap_or_default())]
    Row {
        row_index: usize,
        field: Option<String>,
        reason: String,
    },

    /// Resolved subject id matched a PII pattern.
    #[error("row {row_index}: subject id looks like it contains PII")]
    Pii { row_index: usize },

    /// Input stream exceeded the configured size ceiling.
    #[error("input exceeds maximum size of {max_bytes} bytes")]
    SizeExceeded { max_bytes: u64 },

    /// Input bytes were not valid UTF-8.
    #[error("input is not valid UTF-8")]
    Encoding,

    /// normalization/missing_norm: no normative record for (age_group, metric).
    /// Not fatal; callers treat this as "metric absent from normalized_metrics".
    #[error("no normative record for metric {metric} in age group {age_group}")]
    NoNormative { metric: String, age_group: String },

    /// assessment/no_policy: missing threshold; callers record verdict `uncertain`.
    #[error("no threshold policy for metric {metric} in age group {age_group}")]
    NoPolicy { metric: String, age_group: String },

    /// orchestration/cancelled.
    #[error("batch {batch_id} was cancelled")]
    Cancelled { batch_id: String },

    /// orchestration/timeout; reduces to cancellation.
    #[error("batch {batch_id} exceeded its wall-clock timeout")]
    Timeout { batch_id: String },

    /// export/renderer: surfaces upward without touching stored results.
    #[error("renderer failed: {0}")]
    RendererFailed(String),

    /// Study/threshold/age-group configuration failed server-side validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Referenced entity (batch, study, subject) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else; should be rare and always logged with full context.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type QcResult<T> = std::result::Result<T, QcError>;

impl QcError {
    /// Stable machine-readable code, used in `processing_error` event payloads
    /// and CLI `--json` output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            QcError::Schema(_) => "validation/schema",
            QcError::Row { .. } => "validation/row",
            QcError::Pii { .. } => "validation/pii",
            QcError::SizeExceeded { .. } => "validation/size_exceeded",
            QcError::Encoding => "validation/encoding",
            QcError::NoNormative { .. } => "normalization/missing_norm",
            QcError::NoPolicy { .. } => "assessment/no_policy",
            QcError::Cancelled { .. } => "orchestration/cancelled",
            QcError::Timeout { .. } => "orchestration/timeout",
            QcError::RendererFailed(_) => "export/renderer",
            QcError::ConfigInvalid(_) => "config/invalid",
            QcError::NotFound(_) => "not_found",
            QcError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_per_variant() {
        let e = QcError::Row {
            row_index: 3,
            field: Some("snr".into()),
            reason: "out of range".into(),
        };
        assert_eq!(e.code(), "validation/row");
    }

    #[test]
    fn serializes_with_tag() {
        let e = QcError::NotFound("batch-1".into());
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "NotFound");
    }
}
