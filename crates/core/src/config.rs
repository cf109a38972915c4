use anyhow::Context;
use qcnorm_shared::MetricKind;
use std::collections::BTreeMap;
use std::env;

/// Engine-wide runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub worker_pool_size: usize,
    pub progress_event_interval_rows: usize,
    pub batch_timeout_secs: u64,
    pub max_input_bytes: u64,
    pub event_channel_capacity: usize,
    pub composite_weights: BTreeMap<MetricKind, f64>,
    pub stable_slope_epsilon: f64,
    pub stable_sigma_epsilon: f64,
}

impl EngineConfig {
    pub fn load() -> anyhow::Result<Self> {
        let database_url = env::var("QCNORM_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://qcnorm_studies.db".to_string());

        let worker_pool_size = env::var("QCNORM_WORKER_POOL_SIZE")
            .unwrap_or_else(|_| "4".to_string())
            .parse::<usize>()
            .context("Failed to parse QCNORM_WORKER_POOL_SIZE")?;
        if worker_pool_size == 0 || worker_pool_size > 64 {
            anyhow::bail!(
                "QCNORM_WORKER_POOL_SIZE must be between 1 and 64 (got {})",
                worker_pool_size
            );
        }

        let progress_event_interval_rows = env::var("QCNORM_PROGRESS_EVENT_INTERVAL_ROWS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<usize>()
            .context("Failed to parse QCNORM_PROGRESS_EVENT_INTERVAL_ROWS")?;
        if progress_event_interval_rows == 0 || progress_event_interval_rows > 10_000 {
            anyhow::bail!("QCNORM_PROGRESS_EVENT_INTERVAL_ROWS must be between 1 and 10000");
        }

        let batch_timeout_secs = env::var("QCNORM_BATCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "1800".to_string())
            .parse::<u64>()
            .context("Failed to parse QCNORM_BATCH_TIMEOUT_SECS")?;
        if batch_timeout_secs == 0 {
            anyhow::bail!("QCNORM_BATCH_TIMEOUT_SECS must be >= 1");
        }

        let max_input_bytes = env::var("QCNORM_MAX_INPUT_BYTES")
            .unwrap_or_else(|_| (100 * 1024 * 1024).to_string())
            .parse::<u64>()
            .context("Failed to parse QCNORM_MAX_INPUT_BYTES")?;
        if max_input_bytes == 0 {
            anyhow::bail!("QCNORM_MAX_INPUT_BYTES must be >= 1");
        }

        let event_channel_capacity = env::var("QCNORM_EVENT_CHANNEL_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse::<usize>()
            .context("Failed to parse QCNORM_EVENT_CHANNEL_CAPACITY")?;
        if event_channel_capacity == 0 {
            anyhow::bail!("QCNORM_EVENT_CHANNEL_CAPACITY must be >= 1");
        }

        let stable_slope_epsilon = env::var("QCNORM_STABLE_SLOPE_EPSILON")
            .unwrap_or_else(|_| "0.01".to_string())
            .parse::<f64>()
            .context("Failed to parse QCNORM_STABLE_SLOPE_EPSILON")?;

        let stable_sigma_epsilon = env::var("QCNORM_STABLE_SIGMA_EPSILON")
            .unwrap_or_else(|_| "0.5".to_string())
            .parse::<f64>()
            .context("Failed to parse QCNORM_STABLE_SIGMA_EPSILON")?;

        let composite_weights = load_composite_weights()?;

        Ok(Self {
            database_url,
            worker_pool_size,
            progress_event_interval_rows,
            batch_timeout_secs,
            max_input_bytes,
            event_channel_capacity,
            composite_weights,
            stable_slope_epsilon,
            stable_sigma_epsilon,
        })
    }
}

/// Defaults to an equal weight of 1.0 for every metric in the vocabulary;
/// `QCNORM_COMPOSITE_WEIGHTS` overrides individual entries as `metric=weight`
/// comma-separated pairs, e.g. `snr=2.0,cjv=0.5`.
fn load_composite_weights() -> anyhow::Result<BTreeMap<MetricKind, f64>> {
    let mut weights: BTreeMap<MetricKind, f64> = qcnorm_shared::METRIC_VOCABULARY
        .iter()
        .map(|&m| (m, 1.0))
        .collect();

    if let Ok(raw) = env::var("QCNORM_COMPOSITE_WEIGHTS") {
        for pair in raw.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (name, value) = pair.split_once('=').with_context(|| {
                format!("QCNORM_COMPOSITE_WEIGHTS entry '{pair}' must be 'metric=weight'")
            })?;
            let metric = MetricKind::from_column_name(name.trim())
                .with_context(|| format!("unknown metric '{name}' in QCNORM_COMPOSITE_WEIGHTS"))?;
            let weight: f64 = value.trim().parse().with_context(|| {
                format!("invalid weight '{value}' for metric '{name}' in QCNORM_COMPOSITE_WEIGHTS")
            })?;
            weights.insert(metric, weight);
        }
    }
    Ok(weights)
}
