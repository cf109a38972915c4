use crate::commands::AppContext;
use crate::output::print_batch_summary;
use anyhow::{bail, Context, Result};
use qcnorm_core::{BatchOrchestrator, CsvIngester, EventBus};
use qcnorm_shared::BatchConfig;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a batch end to end and caches its results to disk so a later
/// `qcnorm export` invocation (a fresh process) can retrieve them by
/// `batch_id`.
pub async fn run(
    ctx: &AppContext,
    file: &Path,
    study: Option<&str>,
    no_normalize: bool,
    no_assess: bool,
    workers: Option<usize>,
) -> Result<()> {
    let bytes = std::fs::File::open(file)
        .with_context(|| format!("failed to open {}", file.display()))?;
    let ingester = CsvIngester::new(ctx.engine_config.max_input_bytes);
    let rows = ingester.ingest(bytes).context("failed to parse input CSV")?;

    let study_config = match study {
        Some(name) => Some(
            ctx.study_store()
                .await?
                .require(name)
                .await
                .with_context(|| format!("unknown study '{name}'"))?,
        ),
        None => None,
    };

    let event_bus = Arc::new(EventBus::new(ctx.engine_config.event_channel_capacity));
    let mut subscriber = event_bus.subscribe();
    let batch_id = BatchOrchestrator::new_batch_id();

    let orchestrator = BatchOrchestrator::new(
        Arc::clone(&ctx.normative_store),
        Arc::clone(&event_bus),
        workers.unwrap_or(ctx.engine_config.worker_pool_size),
        ctx.engine_config.progress_event_interval_rows,
        ctx.engine_config.composite_weights.clone(),
    );

    let batch_config = BatchConfig {
        apply_assessment: !no_assess,
        apply_normalization: !no_normalize,
        study: study.map(str::to_string),
    };

    let printer = if ctx.json {
        None
    } else {
        Some(tokio::spawn(async move {
            while let Some(event) = subscriber.recv().await {
                if let qcnorm_shared::BatchEvent::BatchProgress { completed, failed, total, .. } = event {
                    print!("\r  progress: {completed}/{total} ({failed} failed)    ");
                    use std::io::Write as _;
                    let _ = std::io::stdout().flush();
                }
            }
        }))
    };

    let (state, subjects) = orchestrator
        .run(
            batch_id.clone(),
            rows,
            batch_config,
            study_config,
            CancellationToken::new(),
        )
        .await
        .context("batch processing failed")?;

    if let Some(handle) = printer {
        handle.abort();
        println!();
    }

    cache_batch(ctx, &batch_id, &state, &subjects)?;

    if ctx.json {
        println!("{}", serde_json::json!({ "batch_id": batch_id, "state": state }));
    } else {
        print_batch_summary(&state);
        println!("\n  results cached; run `qcnorm export csv {batch_id}` to retrieve them");
    }
    Ok(())
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CachedBatch {
    state: qcnorm_shared::BatchState,
    subjects: Vec<qcnorm_shared::ProcessedSubject>,
}

fn cache_batch(
    ctx: &AppContext,
    batch_id: &str,
    state: &qcnorm_shared::BatchState,
    subjects: &[qcnorm_shared::ProcessedSubject],
) -> Result<()> {
    let path = ctx.cli_config.batch_cache_dir.join(format!("{batch_id}.json"));
    let cached = CachedBatch {
        state: state.clone(),
        subjects: subjects.to_vec(),
    };
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create batch cache file {}", path.display()))?;
    serde_json::to_writer_pretty(file, &cached).context("failed to write batch cache")?;
    Ok(())
}

pub fn load_cached_batch(ctx: &AppContext, batch_id: &str) -> Result<(qcnorm_shared::BatchState, Vec<qcnorm_shared::ProcessedSubject>)> {
    let path = ctx.cli_config.batch_cache_dir.join(format!("{batch_id}.json"));
    if !path.exists() {
        bail!("no cached results for batch '{batch_id}'; run `qcnorm run` first");
    }
    let file = std::fs::File::open(&path)
        .with_context(|| format!("failed to open batch cache file {}", path.display()))?;
    let cached: CachedBatch = serde_json::from_reader(file).context("failed to parse batch cache")?;
    Ok((cached.state, cached.subjects))
}
