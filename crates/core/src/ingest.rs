//! CSV ingestion: RFC 4180 parsing into `SubjectInfo` +
//! `Metrics` pairs, a PII guard on `subject_id`, and a hard byte ceiling
//! enforced before any parsing begins.

use qcnorm_shared::{MetricKind, Metrics, QcError, QcResult, ScanType, Sex, SubjectInfo};
use regex::Regex;
use std::io::Read;
use std::sync::OnceLock;

const IDENTIFIER_COLUMNS: &[&str] = &["bids_name", "subject_id"];

/// One successfully parsed input row, paired with its 0-based row index
/// (the index into the data rows following the header, not counting the
/// header itself).
#[derive(Debug, Clone)]
pub struct IngestedRow {
    pub row_index: usize,
    pub subject: SubjectInfo,
    pub metrics: Metrics,
}

fn pii_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\d{3}-\d{2}-\d{4}|\d{9}\b|[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap()
    })
}

pub struct CsvIngester {
    max_bytes: u64,
}

impl CsvIngester {
    #[must_use]
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Reads the full `input` into memory (bounded by `max_bytes`), then
    /// parses every data row. Each row either succeeds as an `IngestedRow`
    /// or fails independently — a single bad row never aborts the batch
    /// does; a malformed header aborts the whole ingest.
    pub fn ingest<R: Read>(&self, mut input: R) -> QcResult<Vec<QcResult<IngestedRow>>> {
        let mut limited = input.by_ref().take(self.max_bytes + 1);
        let mut buf = Vec::new();
        limited
            .read_to_end(&mut buf)
            .map_err(|e| QcError::Schema(format!("failed to read input: {e}")))?;
        if buf.len() as u64 > self.max_bytes {
            tracing::error!(max_bytes = self.max_bytes, "input exceeds size ceiling");
            return Err(QcError::SizeExceeded {
                max_bytes: self.max_bytes,
            });
        }
        let text = String::from_utf8(buf).map_err(|_| {
            tracing::error!("input is not valid UTF-8");
            QcError::Encoding
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| QcError::Schema(format!("failed to read header row: {e}")))?
            .clone();
        if !IDENTIFIER_COLUMNS.iter().any(|c| headers.iter().any(|h| h == *c)) {
            tracing::error!("missing required column: bids_name or subject_id");
            return Err(QcError::Schema(
                "missing required column: at least one of 'bids_name' or 'subject_id' must be present".into(),
            ));
        }

        let mut rows = Vec::new();
        for (row_index, record) in reader.records().enumerate() {
            let parsed = record
                .map_err(|e| QcError::Row {
                    row_index,
                    field: None,
                    reason: format!("malformed CSV record: {e}"),
                })
                .and_then(|record| parse_row(row_index, &headers, &record));
            rows.push(parsed);
        }
        Ok(rows)
    }
}

fn field<'a>(headers: &csv::StringRecord, record: &'a csv::StringRecord, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|idx| record.get(idx))
        .filter(|v| !v.is_empty())
}

fn parse_row(row_index: usize, headers: &csv::StringRecord, record: &csv::StringRecord) -> QcResult<IngestedRow> {
    let subject_id = field(headers, record, "subject_id")
        .or_else(|| field(headers, record, "bids_name"))
        .ok_or_else(|| QcError::Row {
            row_index,
            field: Some("subject_id".into()),
            reason: "at least one of 'subject_id' or 'bids_name' is required".into(),
        })?
        .to_string();

    if pii_pattern().is_match(&subject_id) {
        return Err(QcError::Pii { row_index });
    }

    let age = match field(headers, record, "age") {
        None => None,
        Some(raw) => {
            let age: f64 = raw.parse().map_err(|_| QcError::Row {
                row_index,
                field: Some("age".into()),
                reason: "age is not a valid number".into(),
            })?;
            if age < 0.0 {
                return Err(QcError::Row {
                    row_index,
                    field: Some("age".into()),
                    reason: format!("age must be non-negative, got {age}"),
                });
            }
            Some(age)
        }
    };

    let mut subject = SubjectInfo::new(subject_id);
    subject.age = age;
    subject.sex = field(headers, record, "sex").and_then(Sex::parse);
    subject.session = field(headers, record, "session").map(str::to_string);
    subject.scan_type = field(headers, record, "scan_type")
        .and_then(ScanType::parse)
        .unwrap_or_default();
    subject.acquisition_date = field(headers, record, "acquisition_date")
        .and_then(|v| v.parse().ok());
    subject.site = field(headers, record, "site").map(str::to_string);
    subject.scanner = field(headers, record, "scanner").map(str::to_string);

    let mut metrics = Metrics::default();
    for metric in qcnorm_shared::METRIC_VOCABULARY {
        if let Some(raw) = field(headers, record, metric.column_name()) {
            let value: f64 = raw.parse().map_err(|_| QcError::Row {
                row_index,
                field: Some(metric.column_name().to_string()),
                reason: format!("'{raw}' is not a valid number"),
            })?;
            let (lo, hi) = metric.sane_range();
            if value < lo || value > hi {
                return Err(QcError::Row {
                    row_index,
                    field: Some(metric.column_name().to_string()),
                    reason: format!("{value} is outside the sane range [{lo}, {hi}]"),
                });
            }
            metrics.set(metric, Some(value));
        }
    }
    metrics.check_consistency().map_err(|reason| QcError::Row {
        row_index,
        field: None,
        reason,
    })?;

    Ok(IngestedRow {
        row_index,
        subject,
        metrics,
    })
}
