use crate::cli::LongitudinalCommand;
use crate::commands::AppContext;
use crate::output::print_header;
use anyhow::{Context, Result};
use qcnorm_core::LongitudinalEngine;
use qcnorm_shared::{LongitudinalSubject, MetricKind, Timepoint, METRIC_VOCABULARY};
use std::path::Path;

pub async fn run(ctx: &AppContext, cmd: LongitudinalCommand) -> Result<()> {
    match cmd {
        LongitudinalCommand::Add {
            subject_id,
            file,
            timepoint,
        } => add(ctx, &subject_id, &file, &timepoint),
        LongitudinalCommand::Trend {
            subject_id,
            metric,
            file,
        } => trend(ctx, &subject_id, &metric, &file),
        LongitudinalCommand::Summary { subject_id, file } => summary(ctx, &subject_id, &file),
        LongitudinalCommand::Transitions { subject_id, file } => transitions(ctx, &subject_id, &file),
    }
}

fn load_subject(file: &Path, subject_id: &str) -> Result<LongitudinalSubject> {
    if !file.exists() {
        return Ok(LongitudinalSubject::new(subject_id));
    }
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let subject: LongitudinalSubject =
        serde_json::from_str(&contents).context("failed to parse longitudinal subject record")?;
    Ok(subject)
}

fn save_subject(file: &Path, subject: &LongitudinalSubject) -> Result<()> {
    let contents = serde_json::to_string_pretty(subject).context("failed to serialize subject record")?;
    std::fs::write(file, contents).with_context(|| format!("failed to write {}", file.display()))
}

fn add(ctx: &AppContext, subject_id: &str, file: &Path, timepoint_file: &Path) -> Result<()> {
    let mut subject = load_subject(file, subject_id)?;
    let contents = std::fs::read_to_string(timepoint_file)
        .with_context(|| format!("failed to read {}", timepoint_file.display()))?;
    let timepoint: Timepoint =
        serde_json::from_str(&contents).context("failed to parse timepoint JSON")?;
    subject.add_timepoint(timepoint);
    save_subject(file, &subject)?;
    if !ctx.json {
        println!("  recorded timepoint; {} now has {} timepoint(s)", subject_id, subject.timepoints.len());
    }
    Ok(())
}

fn parse_metric(name: &str) -> Result<MetricKind> {
    MetricKind::from_column_name(name).with_context(|| format!("unknown metric '{name}'"))
}

fn trend(ctx: &AppContext, subject_id: &str, metric: &str, file: &Path) -> Result<()> {
    let subject = load_subject(file, subject_id)?;
    let metric = parse_metric(metric)?;
    let engine = LongitudinalEngine::new(
        ctx.engine_config.stable_slope_epsilon,
        ctx.engine_config.stable_sigma_epsilon,
    );
    let trend = engine.trend(&subject, metric);
    print_trend(ctx, &trend);
    Ok(())
}

fn summary(ctx: &AppContext, subject_id: &str, file: &Path) -> Result<()> {
    let subject = load_subject(file, subject_id)?;
    let engine = LongitudinalEngine::new(
        ctx.engine_config.stable_slope_epsilon,
        ctx.engine_config.stable_sigma_epsilon,
    );
    let present: std::collections::BTreeSet<MetricKind> = subject
        .timepoints
        .iter()
        .flat_map(|tp| tp.raw_metrics.iter_present().map(|(m, _)| m))
        .collect();
    for metric in METRIC_VOCABULARY {
        if !present.contains(&metric) {
            continue;
        }
        let trend = engine.trend(&subject, metric);
        print_trend(ctx, &trend);
    }
    Ok(())
}

fn transitions(ctx: &AppContext, subject_id: &str, file: &Path) -> Result<()> {
    let subject = load_subject(file, subject_id)?;
    let engine = LongitudinalEngine::new(
        ctx.engine_config.stable_slope_epsilon,
        ctx.engine_config.stable_sigma_epsilon,
    );
    let Some(&first_present) = subject
        .timepoints
        .iter()
        .flat_map(|tp| tp.raw_metrics.iter_present().map(|(m, _)| m))
        .collect::<std::collections::BTreeSet<_>>()
        .iter()
        .next()
    else {
        if !ctx.json {
            println!("  no metrics recorded for '{subject_id}'");
        }
        return Ok(());
    };
    let trend = engine.trend(&subject, first_present);

    if ctx.json {
        println!(
            "{}",
            serde_json::json!({
                "age_group_changes": trend.age_group_changes,
                "quality_status_changes": trend.quality_status_changes,
            })
        );
        return Ok(());
    }
    print_header(&format!("Transitions for {subject_id}"));
    for change in &trend.age_group_changes {
        println!(
            "  age group: {} -> {} at day {:.1} ({})",
            change.from_group, change.to_group, change.at_days_from_baseline, change.timepoint_id
        );
    }
    for change in &trend.quality_status_changes {
        println!(
            "  verdict:   {:?} -> {:?} at day {:.1} ({})",
            change.from_verdict, change.to_verdict, change.at_days_from_baseline, change.timepoint_id
        );
    }
    Ok(())
}

fn print_trend(ctx: &AppContext, trend: &qcnorm_shared::Trend) {
    if ctx.json {
        println!("{}", serde_json::to_string(trend).unwrap_or_default());
        return;
    }
    print_header(&format!("Trend: {}", trend.metric));
    println!("  direction: {:?}", trend.direction);
    match (trend.slope, trend.r_squared, trend.p_value) {
        (Some(slope), Some(r2), Some(p)) => {
            println!("  slope: {slope:.4}   r^2: {r2:.4}   p: {p:.4}");
        }
        _ => println!("  (fewer than two timepoints; no regression computed)"),
    }
}
