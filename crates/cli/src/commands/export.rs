use crate::cli::ExportCommand;
use crate::commands::{run::load_cached_batch, AppContext};
use anyhow::{Context, Result};
use qcnorm_core::{CsvExporter, DocumentModel, ExportOptions, PlainTextRenderer, Renderer};
use std::io::Write as _;

pub async fn run(ctx: &AppContext, cmd: ExportCommand) -> Result<()> {
    match cmd {
        ExportCommand::Csv {
            batch_id,
            out,
            include_raw,
            include_normalized,
            include_assessment,
        } => export_csv(ctx, &batch_id, out, include_raw, include_normalized, include_assessment),
        ExportCommand::Pdf { batch_id, out } => export_pdf(ctx, &batch_id, &out).await,
    }
}

fn export_csv(
    ctx: &AppContext,
    batch_id: &str,
    out: Option<std::path::PathBuf>,
    include_raw: bool,
    include_normalized: bool,
    include_assessment: bool,
) -> Result<()> {
    let (_, subjects) = load_cached_batch(ctx, batch_id)?;

    // None of the three flags set means "include everything", matching the
    // teacher's CLI convention of filter flags being additive opt-ins with
    // an all-columns default.
    let any_selected = include_raw || include_normalized || include_assessment;
    let options = if any_selected {
        ExportOptions {
            include_raw,
            include_normalized,
            include_assessment,
        }
    } else {
        ExportOptions::default()
    };

    match out {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            CsvExporter::export_filtered(file, &subjects, options)
                .context("failed to write CSV export")?;
            if !ctx.json {
                crate::output::print_header("Export complete");
                println!("  wrote {} row(s) to {}", subjects.len(), path.display());
            }
        }
        None => {
            let mut buf = Vec::new();
            CsvExporter::export_filtered(&mut buf, &subjects, options)
                .context("failed to write CSV export")?;
            std::io::stdout().write_all(&buf)?;
        }
    }
    Ok(())
}

/// PDF rendering internals are out of scope; this wires the `Renderer`
/// trait boundary to the `PlainTextRenderer` default so the subcommand is
/// usable until a richer renderer is plugged in behind the same trait.
async fn export_pdf(ctx: &AppContext, batch_id: &str, out: &std::path::Path) -> Result<()> {
    let (_, subjects) = load_cached_batch(ctx, batch_id)?;
    let document = DocumentModel::from_batch(batch_id, subjects);
    let bytes = PlainTextRenderer
        .render(&document)
        .await
        .context("renderer failed")?;
    std::fs::write(out, bytes).with_context(|| format!("failed to write {}", out.display()))?;
    if !ctx.json {
        crate::output::print_header("Export complete");
        println!("  wrote report to {}", out.display());
    }
    Ok(())
}
