use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_normative_path")]
    pub normative_data: PathBuf,
    #[serde(default = "default_batch_cache_dir")]
    pub batch_cache_dir: PathBuf,
}

fn default_database_url() -> String {
    "sqlite://qcnorm_studies.db".to_string()
}

fn default_normative_path() -> PathBuf {
    PathBuf::from("normative.csv")
}

fn default_batch_cache_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("qcnorm")
        .join("batches")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            normative_data: default_normative_path(),
            batch_cache_dir: default_batch_cache_dir(),
        }
    }
}

impl CliConfig {
    /// Config file path: ~/.config/qcnorm/cli.toml
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Cannot determine config directory")?
            .join("qcnorm");
        Ok(config_dir.join("cli.toml"))
    }

    /// Load config from file, falling back to defaults.
    /// Environment variables override file values.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var("QCNORM_DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(path) = std::env::var("QCNORM_NORMATIVE_DATA") {
            config.normative_data = PathBuf::from(path);
        }

        std::fs::create_dir_all(&config.batch_cache_dir).with_context(|| {
            format!(
                "Failed to create batch cache directory {}",
                config.batch_cache_dir.display()
            )
        })?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
