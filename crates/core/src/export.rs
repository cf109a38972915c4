//! CSV export: `ProcessedSubject` results rendered back to a
//! fixed canonical column order, mirroring the ingest schema so a report
//! can round-trip through the pipeline. Also the `Renderer` trait boundary
//! for PDF/report generation — the engine hands a structured `DocumentModel`
//! to an injected renderer rather than rendering bytes itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qcnorm_shared::{ProcessedSubject, QcError, QcResult, Verdict, METRIC_VOCABULARY};
use std::io::Write;

const HEAD_COLUMNS: &[&str] = &["subject_id", "session", "scan_type", "age", "age_group"];
const TAIL_COLUMNS: &[&str] = &["overall", "composite", "confidence", "flags", "recommendations"];

/// Which column blocks a CSV export includes, mirroring
/// `qcnorm export csv --include-raw/--include-normalized/--include-assessment`.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub include_raw: bool,
    pub include_normalized: bool,
    pub include_assessment: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_raw: true,
            include_normalized: true,
            include_assessment: true,
        }
    }
}

pub struct CsvExporter;

impl CsvExporter {
    /// Writes `subjects` as RFC 4180 CSV with every column block included.
    pub fn export<W: Write>(writer: W, subjects: &[ProcessedSubject]) -> QcResult<()> {
        Self::export_filtered(writer, subjects, ExportOptions::default())
    }

    /// Writes `subjects` as RFC 4180 CSV to `writer`. Column order is fixed:
    /// `HEAD_COLUMNS`, then the raw metric block (vocabulary order), then
    /// the percentile block (`percentile_{metric}`), then the z-score block
    /// (`z_{metric}`), then `TAIL_COLUMNS`. `options` toggles whole blocks
    /// on or off rather than reordering them.
    pub fn export_filtered<W: Write>(
        writer: W,
        subjects: &[ProcessedSubject],
        options: ExportOptions,
    ) -> QcResult<()> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);

        let mut header: Vec<String> = HEAD_COLUMNS.iter().map(|s| s.to_string()).collect();
        if options.include_raw {
            header.extend(METRIC_VOCABULARY.iter().map(|m| m.column_name().to_string()));
        }
        if options.include_normalized {
            header.extend(
                METRIC_VOCABULARY
                    .iter()
                    .map(|m| format!("percentile_{}", m.column_name())),
            );
            header.extend(METRIC_VOCABULARY.iter().map(|m| format!("z_{}", m.column_name())));
        }
        if options.include_assessment {
            header.extend(TAIL_COLUMNS.iter().map(|s| s.to_string()));
        }
        wtr.write_record(&header)
            .map_err(|e| QcError::RendererFailed(e.to_string()))?;

        for subject in subjects {
            let mut row = vec![
                subject.subject_info.subject_id.clone(),
                subject.subject_info.session.clone().unwrap_or_default(),
                subject.subject_info.scan_type.as_str().to_string(),
                subject.subject_info.age.map(|a| a.to_string()).unwrap_or_default(),
                subject
                    .normalized_metrics
                    .as_ref()
                    .map(|n| n.age_group.clone())
                    .unwrap_or_default(),
            ];

            if options.include_raw {
                for metric in METRIC_VOCABULARY {
                    row.push(
                        subject
                            .raw_metrics
                            .get(metric)
                            .map(|v| v.to_string())
                            .unwrap_or_default(),
                    );
                }
            }
            if options.include_normalized {
                for metric in METRIC_VOCABULARY {
                    row.push(
                        subject
                            .normalized_metrics
                            .as_ref()
                            .and_then(|n| n.values.get(&metric))
                            .map(|v| format!("{:.2}", v.percentile))
                            .unwrap_or_default(),
                    );
                }
                for metric in METRIC_VOCABULARY {
                    row.push(
                        subject
                            .normalized_metrics
                            .as_ref()
                            .and_then(|n| n.values.get(&metric))
                            .map(|v| format!("{:.2}", v.z_score))
                            .unwrap_or_default(),
                    );
                }
            }
            if options.include_assessment {
                row.push(subject.assessment.overall.as_str().to_string());
                row.push(format!("{:.2}", subject.assessment.composite));
                row.push(format!("{:.4}", subject.assessment.confidence));
                row.push(
                    subject
                        .assessment
                        .flags
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(";"),
                );
                row.push(subject.assessment.recommendations.join(";"));
            }

            wtr.write_record(&row)
                .map_err(|e| QcError::RendererFailed(e.to_string()))?;
        }

        wtr.flush().map_err(|e| QcError::RendererFailed(e.to_string()))?;
        Ok(())
    }
}

/// Roll-up counts for a `DocumentModel`'s report header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportSummary {
    pub total: usize,
    pub pass: usize,
    pub warning: usize,
    pub fail: usize,
    pub uncertain: usize,
}

impl ReportSummary {
    #[must_use]
    pub fn from_subjects(subjects: &[ProcessedSubject]) -> Self {
        let mut summary = Self {
            total: subjects.len(),
            ..Self::default()
        };
        for subject in subjects {
            match subject.assessment.overall {
                Verdict::Pass => summary.pass += 1,
                Verdict::Warning => summary.warning += 1,
                Verdict::Fail => summary.fail += 1,
                Verdict::Uncertain => summary.uncertain += 1,
            }
        }
        summary
    }
}

/// The renderer-agnostic structured value a PDF (or any other document)
/// report is built from. The engine never renders bytes itself; it hands
/// this to an injected `Renderer`.
#[derive(Debug, Clone)]
pub struct DocumentModel {
    pub title: String,
    pub batch_id: String,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub subjects: Vec<ProcessedSubject>,
}

impl DocumentModel {
    #[must_use]
    pub fn from_batch(batch_id: impl Into<String>, subjects: Vec<ProcessedSubject>) -> Self {
        let summary = ReportSummary::from_subjects(&subjects);
        Self {
            title: "QC Batch Report".to_string(),
            batch_id: batch_id.into(),
            generated_at: Utc::now(),
            summary,
            subjects,
        }
    }
}

/// A renderer turns a `DocumentModel` into bytes (PDF
/// rendering internals are out of scope, only this boundary is).
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, document: &DocumentModel) -> QcResult<Vec<u8>>;
}

/// Discards the document, returning an empty byte string. Useful as a
/// test double for call sites that only care whether rendering was invoked.
pub struct NullRenderer;

#[async_trait]
impl Renderer for NullRenderer {
    async fn render(&self, _document: &DocumentModel) -> QcResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Minimal renderer that writes the document model as a readable text
/// report, shipped so the CLI has a working default until a richer PDF
/// renderer is wired in behind the same trait.
pub struct PlainTextRenderer;

#[async_trait]
impl Renderer for PlainTextRenderer {
    async fn render(&self, document: &DocumentModel) -> QcResult<Vec<u8>> {
        let mut out = String::new();
        out.push_str(&format!("{}\n", document.title));
        out.push_str(&format!("batch_id: {}\n", document.batch_id));
        out.push_str(&format!("generated_at: {}\n", document.generated_at.to_rfc3339()));
        out.push_str(&format!(
            "total: {}   pass: {}   warning: {}   fail: {}   uncertain: {}\n\n",
            document.summary.total,
            document.summary.pass,
            document.summary.warning,
            document.summary.fail,
            document.summary.uncertain
        ));
        for subject in &document.subjects {
            out.push_str(&format!(
                "{}: {:?} (composite {:.2}, confidence {:.2})\n",
                subject.subject_info.subject_id,
                subject.assessment.overall,
                subject.assessment.composite,
                subject.assessment.confidence,
            ));
        }
        Ok(out.into_bytes())
    }
}
