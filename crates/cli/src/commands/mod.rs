mod export;
mod ingest;
mod longitudinal;
mod run;
mod study;

use crate::cli::{Cli, Commands};
use crate::config::CliConfig;
use anyhow::{Context, Result};
use qcnorm_core::{EngineConfig, NormativeDataset, NormativeStore, StudyConfigStore};
use std::sync::Arc;

/// Shared state assembled once per invocation and threaded through every
/// subcommand.
pub struct AppContext {
    pub cli_config: CliConfig,
    pub engine_config: EngineConfig,
    pub normative_store: Arc<NormativeStore>,
    pub json: bool,
}

impl AppContext {
    async fn build(json: bool) -> Result<Self> {
        let cli_config = CliConfig::load()?;
        let engine_config = EngineConfig::load().context("failed to load engine configuration")?;

        let normative_store = Arc::new(NormativeStore::new());
        if cli_config.normative_data.exists() {
            let file = std::fs::File::open(&cli_config.normative_data).with_context(|| {
                format!("failed to open normative data at {}", cli_config.normative_data.display())
            })?;
            let dataset = NormativeDataset::from_csv("default", file)
                .context("failed to parse normative data CSV")?;
            normative_store.register(dataset);
        } else {
            tracing::warn!(
                path = %cli_config.normative_data.display(),
                "no normative data file found; using illustrative defaults"
            );
            normative_store.register(fallback_dataset());
        }

        Ok(Self {
            cli_config,
            engine_config,
            normative_store,
            json,
        })
    }

    pub async fn study_store(&self) -> Result<StudyConfigStore> {
        StudyConfigStore::connect(&self.cli_config.database_url)
            .await
            .context("failed to connect to the study configuration store")
    }
}

/// A small illustrative dataset used when no `normative_data` file is
/// configured, so a fresh checkout can still run end to end.
fn fallback_dataset() -> NormativeDataset {
    let mut dataset = NormativeDataset::new("default", qcnorm_shared::default_age_groups())
        .expect("default age groups are always valid");
    for group in qcnorm_shared::default_age_groups() {
        for metric in qcnorm_shared::METRIC_VOCABULARY {
            dataset.insert_record(&group.name, qcnorm_core::normative_store::illustrative_record(metric));
        }
    }
    dataset
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let ctx = AppContext::build(cli.json).await?;
    match cli.command {
        Commands::Ingest { file, study } => ingest::run(&ctx, &file, study.as_deref()).await,
        Commands::Run {
            file,
            study,
            no_normalize,
            no_assess,
            workers,
        } => run::run(&ctx, &file, study.as_deref(), no_normalize, no_assess, workers).await,
        Commands::Export(cmd) => export::run(&ctx, cmd).await,
        Commands::Study(cmd) => study::run(&ctx, cmd).await,
        Commands::Longitudinal(cmd) => longitudinal::run(&ctx, cmd).await,
    }
}
