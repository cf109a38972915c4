use crate::normative::{AgeGroup, Threshold};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A study's custom age groups/thresholds/exclusions. Unique by `study_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfiguration {
    pub study_name: String,
    pub normative_dataset: String,
    pub custom_age_groups: Option<Vec<AgeGroup>>,
    pub custom_thresholds: Option<Vec<Threshold>>,
    pub exclusion_criteria: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
