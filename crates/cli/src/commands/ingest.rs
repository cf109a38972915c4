use crate::commands::AppContext;
use crate::output::print_errors_table;
use anyhow::{Context, Result};
use qcnorm_core::CsvIngester;
use qcnorm_shared::ProcessingError;
use std::path::Path;

pub async fn run(ctx: &AppContext, file: &Path, study: Option<&str>) -> Result<()> {
    let bytes = std::fs::File::open(file)
        .with_context(|| format!("failed to open {}", file.display()))?;
    let ingester = CsvIngester::new(ctx.engine_config.max_input_bytes);
    let rows = ingester.ingest(bytes).context("failed to parse input CSV")?;

    let mut ok_count = 0usize;
    let mut errors = Vec::new();
    for (i, row) in rows.into_iter().enumerate() {
        match row {
            Ok(_) => ok_count += 1,
            Err(e) => errors.push(ProcessingError::from_qc_error(i, &e)),
        }
    }

    if let Some(study) = study {
        tracing::info!(study, "exclusion criteria are reported but not yet applied during ingest-only validation");
    }

    if ctx.json {
        println!(
            "{}",
            serde_json::json!({ "ok": ok_count, "errors": errors })
        );
    } else {
        crate::output::print_header("Ingest result");
        println!("  {ok_count} row(s) valid, {} row(s) with errors", errors.len());
        if !errors.is_empty() {
            print_errors_table(&errors);
        }
    }
    Ok(())
}
