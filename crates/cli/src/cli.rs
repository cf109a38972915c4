use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "qcnorm",
    about = "Age-normed neuroimaging QC pipeline",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Output raw JSON (for scripting/piping)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a CSV file and report per-row errors without processing it
    Ingest {
        /// Path to the input CSV
        file: PathBuf,
        /// Study whose exclusion criteria should be considered
        #[arg(long)]
        study: Option<String>,
    },

    /// Run a batch: ingest, normalize, assess, and report progress to stdout
    Run {
        /// Path to the input CSV
        file: PathBuf,
        /// Study configuration to apply (custom age groups/thresholds)
        #[arg(long)]
        study: Option<String>,
        /// Skip percentile/z-score normalization
        #[arg(long)]
        no_normalize: bool,
        /// Skip threshold-based assessment
        #[arg(long)]
        no_assess: bool,
        /// Worker pool size (defaults to the configured engine value)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Export a previously run batch's results
    #[command(subcommand)]
    Export(ExportCommand),

    /// Manage study configurations
    #[command(subcommand)]
    Study(StudyCommand),

    /// Longitudinal trend analysis
    #[command(subcommand)]
    Longitudinal(LongitudinalCommand),
}

#[derive(Subcommand)]
pub enum ExportCommand {
    /// Export a batch's results as CSV
    Csv {
        /// Batch ID returned by `qcnorm run`
        batch_id: String,
        /// Output path (defaults to stdout)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        include_raw: bool,
        #[arg(long)]
        include_normalized: bool,
        #[arg(long)]
        include_assessment: bool,
    },
    /// Export a batch's results as a PDF report (renderer stub)
    Pdf {
        /// Batch ID returned by `qcnorm run`
        batch_id: String,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum StudyCommand {
    /// Create a new study configuration
    Create {
        name: String,
        #[arg(long)]
        normative_dataset: String,
        #[arg(long)]
        created_by: String,
    },
    /// Update an existing study configuration; only passed fields change
    Update {
        name: String,
        #[arg(long)]
        normative_dataset: Option<String>,
        #[arg(long)]
        exclusion_criteria: Option<Vec<String>>,
    },
    /// Show a study configuration
    Show { name: String },
    /// List every study configuration
    List,
    /// Delete a study configuration
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum LongitudinalCommand {
    /// Add a timepoint to a longitudinal subject record, creating it if absent
    Add {
        subject_id: String,
        /// Path to the subject's JSON record (read and rewritten)
        #[arg(long)]
        file: PathBuf,
        /// Path to a JSON-encoded `Timepoint` to append
        #[arg(long)]
        timepoint: PathBuf,
    },
    /// Compute the trend for one metric across a subject's timepoints
    Trend {
        subject_id: String,
        #[arg(long)]
        metric: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Summarize trends for every present metric
    Summary {
        subject_id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Report age-group and quality-status transitions
    Transitions {
        subject_id: String,
        #[arg(long)]
        file: PathBuf,
    },
}
