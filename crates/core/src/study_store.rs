//! Study configuration persistence: a small SQLite-backed
//! CRUD store, the only stateful component outside the in-memory
//! normative store. Every query is wrapped in a hard timeout, the same
//! idiom used throughout for database access against a single-writer
//! SQLite file.

use qcnorm_shared::{AgeGroup, QcError, QcResult, StudyConfiguration, Threshold};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use validator::{Validate, ValidationError};

const DB_TIMEOUT_SECS: u64 = 5;

pub struct StudyConfigStore {
    pool: SqlitePool,
}

impl StudyConfigStore {
    pub async fn connect(database_url: &str) -> QcResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| QcError::Internal(format!("failed to connect to {database_url}: {e}")))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| QcError::Internal(format!("failed to run migrations: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn create(&self, req: CreateStudyRequest) -> QcResult<StudyConfiguration> {
        validate_request(&req)?;
        let now = chrono::Utc::now();
        let config = StudyConfiguration {
            study_name: req.study_name,
            normative_dataset: req.normative_dataset,
            custom_age_groups: req.custom_age_groups,
            custom_thresholds: req.custom_thresholds,
            exclusion_criteria: req.exclusion_criteria,
            created_by: req.created_by,
            created_at: now,
            updated_at: now,
        };
        self.insert(&config).await?;
        tracing::info!(study_name = %config.study_name, "study configuration created");
        Ok(config)
    }

    async fn insert(&self, config: &StudyConfiguration) -> QcResult<()> {
        let age_groups_json = config
            .custom_age_groups
            .as_ref()
            .map(|g| serde_json::to_string(g))
            .transpose()
            .map_err(|e| QcError::Internal(e.to_string()))?;
        let thresholds_json = config
            .custom_thresholds
            .as_ref()
            .map(|t| serde_json::to_string(t))
            .transpose()
            .map_err(|e| QcError::Internal(e.to_string()))?;
        let exclusion_json = serde_json::to_string(&config.exclusion_criteria)
            .map_err(|e| QcError::Internal(e.to_string()))?;

        let query = sqlx::query(
            "INSERT INTO study_configurations \
             (study_name, normative_dataset, custom_age_groups, custom_thresholds, exclusion_criteria, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&config.study_name)
        .bind(&config.normative_dataset)
        .bind(&age_groups_json)
        .bind(&thresholds_json)
        .bind(&exclusion_json)
        .bind(&config.created_by)
        .bind(config.created_at.to_rfc3339())
        .bind(config.updated_at.to_rfc3339());

        tokio::time::timeout(Duration::from_secs(DB_TIMEOUT_SECS), query.execute(&self.pool))
            .await
            .map_err(|_| QcError::Internal("database insert timed out".to_string()))?
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint failed") {
                    QcError::ConfigInvalid(format!("study '{}' already exists", config.study_name))
                } else {
                    QcError::Internal(e.to_string())
                }
            })?;
        Ok(())
    }

    /// Applies `req`'s present fields to an existing configuration, leaving
    /// the rest untouched. Re-validates the merged result before writing it.
    pub async fn update(&self, study_name: &str, req: UpdateStudyRequest) -> QcResult<StudyConfiguration> {
        let mut config = self.require(study_name).await?;
        if let Some(dataset) = req.normative_dataset {
            config.normative_dataset = dataset;
        }
        if let Some(groups) = req.custom_age_groups {
            qcnorm_shared::validate_age_groups(&groups).map_err(QcError::ConfigInvalid)?;
            config.custom_age_groups = Some(groups);
        }
        if let Some(thresholds) = req.custom_thresholds {
            for t in &thresholds {
                t.validate().map_err(|e| QcError::ConfigInvalid(e.to_string()))?;
            }
            config.custom_thresholds = Some(thresholds);
        }
        if let Some(exclusion_criteria) = req.exclusion_criteria {
            config.exclusion_criteria = exclusion_criteria;
        }
        config.updated_at = chrono::Utc::now();

        let age_groups_json = config
            .custom_age_groups
            .as_ref()
            .map(|g| serde_json::to_string(g))
            .transpose()
            .map_err(|e| QcError::Internal(e.to_string()))?;
        let thresholds_json = config
            .custom_thresholds
            .as_ref()
            .map(|t| serde_json::to_string(t))
            .transpose()
            .map_err(|e| QcError::Internal(e.to_string()))?;
        let exclusion_json = serde_json::to_string(&config.exclusion_criteria)
            .map_err(|e| QcError::Internal(e.to_string()))?;

        let query = sqlx::query(
            "UPDATE study_configurations \
             SET normative_dataset = ?, custom_age_groups = ?, custom_thresholds = ?, \
             exclusion_criteria = ?, updated_at = ? WHERE study_name = ?",
        )
        .bind(&config.normative_dataset)
        .bind(&age_groups_json)
        .bind(&thresholds_json)
        .bind(&exclusion_json)
        .bind(config.updated_at.to_rfc3339())
        .bind(study_name);

        tokio::time::timeout(Duration::from_secs(DB_TIMEOUT_SECS), query.execute(&self.pool))
            .await
            .map_err(|_| QcError::Internal("database update timed out".to_string()))?
            .map_err(|e| QcError::Internal(e.to_string()))?;

        tracing::info!(study_name, "study configuration updated");
        Ok(config)
    }

    pub async fn get(&self, study_name: &str) -> QcResult<Option<StudyConfiguration>> {
        let query = sqlx::query("SELECT * FROM study_configurations WHERE study_name = ?").bind(study_name);
        let row = tokio::time::timeout(Duration::from_secs(DB_TIMEOUT_SECS), query.fetch_optional(&self.pool))
            .await
            .map_err(|_| QcError::Internal("database query timed out".to_string()))?
            .map_err(|e| QcError::Internal(e.to_string()))?;
        row.map(row_to_config).transpose()
    }

    pub async fn require(&self, study_name: &str) -> QcResult<StudyConfiguration> {
        self.get(study_name)
            .await?
            .ok_or_else(|| QcError::NotFound(format!("study '{study_name}'")))
    }

    pub async fn list(&self) -> QcResult<Vec<StudyConfiguration>> {
        let query = sqlx::query("SELECT * FROM study_configurations ORDER BY study_name");
        let rows = tokio::time::timeout(Duration::from_secs(DB_TIMEOUT_SECS), query.fetch_all(&self.pool))
            .await
            .map_err(|_| QcError::Internal("database query timed out".to_string()))?
            .map_err(|e| QcError::Internal(e.to_string()))?;
        rows.into_iter().map(row_to_config).collect()
    }

    pub async fn delete(&self, study_name: &str) -> QcResult<bool> {
        let query = sqlx::query("DELETE FROM study_configurations WHERE study_name = ?").bind(study_name);
        let result = tokio::time::timeout(Duration::from_secs(DB_TIMEOUT_SECS), query.execute(&self.pool))
            .await
            .map_err(|_| QcError::Internal("database delete timed out".to_string()))?
            .map_err(|e| QcError::Internal(e.to_string()))?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(study_name, "study configuration deleted");
        }
        Ok(deleted)
    }
}

fn row_to_config(row: sqlx::sqlite::SqliteRow) -> QcResult<StudyConfiguration> {
    let age_groups_json: Option<String> = row.try_get("custom_age_groups").map_err(|e| QcError::Internal(e.to_string()))?;
    let thresholds_json: Option<String> = row.try_get("custom_thresholds").map_err(|e| QcError::Internal(e.to_string()))?;
    let exclusion_json: String = row.try_get("exclusion_criteria").map_err(|e| QcError::Internal(e.to_string()))?;
    let created_at: String = row.try_get("created_at").map_err(|e| QcError::Internal(e.to_string()))?;
    let updated_at: String = row.try_get("updated_at").map_err(|e| QcError::Internal(e.to_string()))?;

    Ok(StudyConfiguration {
        study_name: row.try_get("study_name").map_err(|e| QcError::Internal(e.to_string()))?,
        normative_dataset: row.try_get("normative_dataset").map_err(|e| QcError::Internal(e.to_string()))?,
        custom_age_groups: age_groups_json
            .map(|j| serde_json::from_str::<Vec<AgeGroup>>(&j))
            .transpose()
            .map_err(|e| QcError::Internal(e.to_string()))?,
        custom_thresholds: thresholds_json
            .map(|j| serde_json::from_str::<Vec<Threshold>>(&j))
            .transpose()
            .map_err(|e| QcError::Internal(e.to_string()))?,
        exclusion_criteria: serde_json::from_str(&exclusion_json).map_err(|e| QcError::Internal(e.to_string()))?,
        created_by: row.try_get("created_by").map_err(|e| QcError::Internal(e.to_string()))?,
        created_at: created_at
            .parse()
            .map_err(|e: chrono::ParseError| QcError::Internal(e.to_string()))?,
        updated_at: updated_at
            .parse()
            .map_err(|e: chrono::ParseError| QcError::Internal(e.to_string()))?,
    })
}

/// Request DTO for creating a study, validated before it ever reaches SQL.
#[derive(Debug, Clone, Validate, serde::Deserialize)]
pub struct CreateStudyRequest {
    #[validate(length(min = 1, max = 128))]
    pub study_name: String,
    #[validate(length(min = 1))]
    pub normative_dataset: String,
    #[validate(custom = "validate_custom_age_groups")]
    pub custom_age_groups: Option<Vec<AgeGroup>>,
    #[validate(custom = "validate_custom_thresholds")]
    pub custom_thresholds: Option<Vec<Threshold>>,
    pub exclusion_criteria: Vec<String>,
    #[validate(length(min = 1))]
    pub created_by: String,
}

/// Request DTO for `StudyConfigStore::update`. Every field is optional;
/// absent fields leave the stored configuration unchanged.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UpdateStudyRequest {
    pub normative_dataset: Option<String>,
    pub custom_age_groups: Option<Vec<AgeGroup>>,
    pub custom_thresholds: Option<Vec<Threshold>>,
    pub exclusion_criteria: Option<Vec<String>>,
}

fn validate_custom_age_groups(groups: &Vec<AgeGroup>) -> Result<(), ValidationError> {
    qcnorm_shared::validate_age_groups(groups)
        .map_err(|_| ValidationError::new("invalid_age_groups"))
}

fn validate_custom_thresholds(thresholds: &Vec<Threshold>) -> Result<(), ValidationError> {
    for t in thresholds {
        t.validate().map_err(|_| ValidationError::new("invalid_threshold_direction"))?;
    }
    Ok(())
}

fn validate_request(req: &CreateStudyRequest) -> QcResult<()> {
    req.validate()
        .map_err(|e| QcError::ConfigInvalid(e.to_string()))
}
