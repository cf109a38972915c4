use colored::Colorize;
use comfy_table::{presets::NOTHING, ContentArrangement, Table};
use qcnorm_shared::{BatchState, ProcessingError, Verdict};

/// Print a decorated section header.
pub fn print_header(title: &str) {
    let line = "─".repeat(36);
    println!();
    println!("  {}", title.bold());
    println!("  {}", line.dimmed());
}

/// Verdict dot: ● (pass/green), ◐ (warning/yellow), ✕ (fail/red), ○ (uncertain/dim).
pub fn verdict_dot(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => "●".green().to_string(),
        Verdict::Warning => "◐".yellow().to_string(),
        Verdict::Fail => "✕".red().to_string(),
        Verdict::Uncertain => "○".dimmed().to_string(),
    }
}

pub fn print_batch_summary(state: &BatchState) {
    print_header(&format!("Batch {}", state.batch_id));
    println!(
        "  status: {:?}   completed: {}   failed: {}   total: {}   ({:.1}%)",
        state.status, state.progress.completed, state.progress.failed, state.progress.total, state.progress.percent
    );
    if !state.errors.is_empty() {
        print_errors_table(&state.errors);
    }
}

pub fn print_errors_table(errors: &[ProcessingError]) {
    let mut table = Table::new();
    table.load_preset(NOTHING).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["row", "code", "field", "message"]);
    for err in errors {
        table.add_row(vec![
            err.row_index.to_string(),
            err.code.clone(),
            err.field.clone().unwrap_or_default(),
            err.message.clone(),
        ]);
    }
    println!("{table}");
}
