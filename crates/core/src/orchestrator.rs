//! Worker-pool batch orchestration: rows flow through a single
//! `mpsc` channel shared by a fixed pool of workers, each processing one
//! row end-to-end (age classification, normalization, assessment) and
//! racing a `CancellationToken` against the channel so a mid-batch cancel
//! or timeout stops new work promptly without losing in-flight results.

use crate::age_classifier::AgeClassifier;
use crate::assessor::Assessor;
use crate::event_bus::EventBus;
use crate::ingest::IngestedRow;
use crate::normalizer::Normalizer;
use crate::normative_store::NormativeStore;
use crate::threshold::ThresholdResolver;
use qcnorm_shared::{
    BatchConfig, BatchEvent, BatchState, BatchStatus, ProcessedSubject, ProcessingError, QcError,
    QcResult, StudyConfiguration,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

pub struct BatchOrchestrator {
    normative_store: Arc<NormativeStore>,
    event_bus: Arc<EventBus>,
    worker_pool_size: usize,
    progress_event_interval_rows: usize,
    composite_weights: BTreeMap<qcnorm_shared::MetricKind, f64>,
}

impl BatchOrchestrator {
    /// A fresh, globally-unique batch identifier for callers that don't
    /// already have one (e.g. the CLI's `run` command).
    #[must_use]
    pub fn new_batch_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[must_use]
    pub fn new(
        normative_store: Arc<NormativeStore>,
        event_bus: Arc<EventBus>,
        worker_pool_size: usize,
        progress_event_interval_rows: usize,
        composite_weights: BTreeMap<qcnorm_shared::MetricKind, f64>,
    ) -> Self {
        Self {
            normative_store,
            event_bus,
            worker_pool_size,
            progress_event_interval_rows,
            composite_weights,
        }
    }

    /// Processes every row of `rows`, returning a `BatchState` summarizing
    /// the run and the successfully processed subjects, sorted by
    /// `row_index` regardless of the nondeterministic completion order of
    /// the worker pool — output order is always stable regardless.
    pub async fn run(
        &self,
        batch_id: String,
        rows: Vec<QcResult<IngestedRow>>,
        batch_config: BatchConfig,
        study: Option<StudyConfiguration>,
        cancel: CancellationToken,
    ) -> QcResult<(BatchState, Vec<ProcessedSubject>)> {
        let total = rows.len();
        let started_at = chrono::Utc::now();
        tracing::info!(batch_id = %batch_id, total, "batch started");
        self.event_bus.publish(BatchEvent::BatchStarted {
            batch_id: batch_id.clone(),
            total,
        });

        let normative_dataset_name = study
            .as_ref()
            .map(|s| s.normative_dataset.clone())
            .unwrap_or_else(|| "default".to_string());
        let dataset = self.normative_store.require(&normative_dataset_name)?;

        let age_groups = study
            .as_ref()
            .and_then(|s| s.custom_age_groups.clone())
            .unwrap_or_else(|| dataset.age_groups.clone());
        let classifier = Arc::new(AgeClassifier::new(age_groups).map_err(QcError::ConfigInvalid)?);

        let overrides: Vec<_> = study
            .as_ref()
            .and_then(|s| s.custom_thresholds.clone())
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel::<(usize, QcResult<IngestedRow>)>(self.worker_pool_size * 4);
        let rx = Arc::new(Mutex::new(rx));

        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let last_reported = Arc::new(AtomicUsize::new(0));
        let progress_interval = self.progress_event_interval_rows.max(1);
        let mut results: Vec<(usize, Option<ProcessedSubject>, Option<ProcessingError>)> =
            Vec::with_capacity(total);

        let feeder = {
            let tx = tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                for (idx, row) in rows.into_iter().enumerate() {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        send_result = tx.send((idx, row)) => {
                            if send_result.is_err() {
                                break;
                            }
                        }
                    }
                }
            })
        };
        drop(tx);

        let mut worker_handles = Vec::with_capacity(self.worker_pool_size);
        for _ in 0..self.worker_pool_size {
            let rx = Arc::clone(&rx);
            let cancel = cancel.clone();
            let classifier = Arc::clone(&classifier);
            let dataset = Arc::clone(&dataset);
            let overrides = overrides.clone();
            let weights = self.composite_weights.clone();
            let batch_config = batch_config.clone();
            let batch_id = batch_id.clone();
            let event_bus = Arc::clone(&self.event_bus);
            let completed = Arc::clone(&completed);
            let failed = Arc::clone(&failed);
            let last_reported = Arc::clone(&last_reported);
            let total = total;

            worker_handles.push(tokio::spawn(async move {
                let mut out = Vec::new();
                loop {
                    let item = {
                        let mut guard = rx.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => None,
                            item = guard.recv() => item,
                        }
                    };
                    let Some((row_index, row_result)) = item else {
                        break;
                    };

                    let resolver = ThresholdResolver::new(&overrides);
                    let (subject_out, error_out) = process_row(
                        row_index,
                        row_result,
                        &classifier,
                        &dataset,
                        &resolver,
                        &weights,
                        &batch_config,
                    );

                    if subject_out.is_some() {
                        completed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }

                    if let Some(subject) = &subject_out {
                        event_bus.publish(BatchEvent::SubjectProcessed {
                            batch_id: batch_id.clone(),
                            subject_id: subject.subject_info.subject_id.clone(),
                            row_index,
                            verdict: subject.assessment.overall,
                        });
                    }
                    if let Some(err) = &error_out {
                        event_bus.publish(BatchEvent::ProcessingErrorEvent {
                            batch_id: batch_id.clone(),
                            row_index,
                            code: err.code.clone(),
                            message: err.message.clone(),
                            field: err.field.clone(),
                        });
                    }

                    let done = completed.load(Ordering::Relaxed) + failed.load(Ordering::Relaxed);
                    let prev = last_reported.load(Ordering::Relaxed);
                    if done.saturating_sub(prev) >= progress_interval
                        && last_reported
                            .compare_exchange(prev, done, Ordering::Relaxed, Ordering::Relaxed)
                            .is_ok()
                    {
                        event_bus.publish(BatchEvent::BatchProgress {
                            batch_id: batch_id.clone(),
                            completed: completed.load(Ordering::Relaxed),
                            failed: failed.load(Ordering::Relaxed),
                            total,
                            percent: if total == 0 {
                                0.0
                            } else {
                                100.0 * done as f64 / total as f64
                            },
                        });
                    }

                    out.push((row_index, subject_out, error_out));
                }
                out
            }));
        }

        feeder.await.map_err(|e| QcError::Internal(format!("feeder task panicked: {e}")))?;

        for handle in worker_handles {
            let mut worker_results = handle
                .await
                .map_err(|e| QcError::Internal(format!("worker task panicked: {e}")))?;
            results.append(&mut worker_results);
        }

        results.sort_by_key(|(row_index, _, _)| *row_index);

        let mut subjects = Vec::new();
        let mut errors = Vec::new();
        for (_, subject, error) in results {
            if let Some(subject) = subject {
                subjects.push(subject);
            }
            if let Some(error) = error {
                errors.push(error);
            }
        }

        let elapsed_ms = (chrono::Utc::now() - started_at).num_milliseconds().max(0) as u64;
        let status = if cancel.is_cancelled() {
            BatchStatus::Cancelled
        } else if errors.len() == total && total > 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };

        let terminal_event = match status {
            BatchStatus::Cancelled => BatchEvent::BatchCancelled {
                batch_id: batch_id.clone(),
                completed: completed.load(Ordering::Relaxed),
                failed: failed.load(Ordering::Relaxed),
                elapsed_ms,
            },
            BatchStatus::Failed => BatchEvent::BatchFailed {
                batch_id: batch_id.clone(),
                completed: completed.load(Ordering::Relaxed),
                failed: failed.load(Ordering::Relaxed),
                elapsed_ms,
            },
            _ => BatchEvent::BatchCompleted {
                batch_id: batch_id.clone(),
                completed: completed.load(Ordering::Relaxed),
                failed: failed.load(Ordering::Relaxed),
                elapsed_ms,
            },
        };
        self.event_bus.publish(terminal_event);
        match status {
            BatchStatus::Cancelled => tracing::info!(batch_id = %batch_id, elapsed_ms, "batch cancelled"),
            BatchStatus::Failed => tracing::error!(batch_id = %batch_id, elapsed_ms, errors = errors.len(), "batch failed"),
            _ => tracing::info!(batch_id = %batch_id, elapsed_ms, completed = completed.load(Ordering::Relaxed), "batch completed"),
        }

        let mut state = BatchState::new(batch_id, total);
        state.status = status;
        state.progress = qcnorm_shared::Progress {
            completed: completed.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
            total,
            percent: 0.0,
        }
        .recompute_percent();
        state.errors = errors;
        state.started_at = Some(started_at);
        state.completed_at = Some(chrono::Utc::now());

        Ok((state, subjects))
    }
}

fn process_row(
    row_index: usize,
    row_result: QcResult<IngestedRow>,
    classifier: &AgeClassifier,
    dataset: &crate::normative_store::NormativeDataset,
    resolver: &ThresholdResolver<'_>,
    weights: &BTreeMap<qcnorm_shared::MetricKind, f64>,
    batch_config: &BatchConfig,
) -> (Option<ProcessedSubject>, Option<ProcessingError>) {
    let row = match row_result {
        Ok(row) => row,
        Err(err) => {
            tracing::debug!(row_index, error = %err, "row rejected during ingest");
            return (None, Some(ProcessingError::from_qc_error(row_index, &err)));
        }
    };

    let age_group = row.subject.age.and_then(|age| classifier.classify(age));
    if age_group.is_none() {
        tracing::warn!(row_index, subject_id = %row.subject.subject_id, "no age group resolved for subject");
    }

    let normalized_metrics = if batch_config.apply_normalization {
        age_group
            .as_deref()
            .map(|group| Normalizer::normalize(&row.metrics, dataset, group))
    } else {
        None
    };

    let assessment = if batch_config.apply_assessment {
        match age_group.as_deref() {
            Some(group) => {
                let assessor = Assessor::new(weights);
                assessor.assess(&row.metrics, resolver, dataset, group, normalized_metrics.as_ref())
            }
            None => empty_uncertain_assessment(),
        }
    } else {
        empty_uncertain_assessment()
    };

    let subject = ProcessedSubject {
        subject_info: row.subject,
        raw_metrics: row.metrics,
        normalized_metrics,
        assessment,
        processing_timestamp: chrono::Utc::now(),
        processing_version: env!("CARGO_PKG_VERSION").to_string(),
        row_index,
    };
    (Some(subject), None)
}

fn empty_uncertain_assessment() -> qcnorm_shared::QualityAssessment {
    qcnorm_shared::QualityAssessment {
        overall: qcnorm_shared::Verdict::Uncertain,
        per_metric: BTreeMap::new(),
        composite: 50.0,
        confidence: 0.0,
        recommendations: vec!["no age group could be determined for this subject".to_string()],
        flags: std::iter::once("no_age_group".to_string()).collect(),
        violations: BTreeMap::new(),
    }
}
