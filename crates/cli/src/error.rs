use colored::Colorize;

/// Format an error for CLI display with contextual help messages.
pub fn display_error(err: &anyhow::Error) {
    let msg = format!("{err}");

    if msg.contains("no such file or directory") || msg.contains("os error 2") {
        eprintln!("  {} Input file not found", "ERROR".red().bold());
        eprintln!("        Check the path you passed to {}", "qcnorm".dimmed());
    } else if msg.contains("not_found") || msg.contains("NotFound") {
        eprintln!("  {} {}", "ERROR".red().bold(), msg);
        eprintln!(
            "        List existing studies with: {}",
            "qcnorm study list".dimmed()
        );
    } else if msg.contains("validation/") || msg.contains("config/invalid") {
        eprintln!("  {} {}", "ERROR".red().bold(), msg);
        eprintln!("        Fix the offending row or field and re-run.");
    } else {
        eprintln!("  {} {}", "ERROR".red().bold(), msg);
        for cause in err.chain().skip(1) {
            eprintln!("        {} {cause}", "caused by:".dimmed());
        }
    }
}
