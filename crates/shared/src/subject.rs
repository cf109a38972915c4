use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
    O,
    U,
}

impl Sex {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "M" => Some(Sex::M),
            "F" => Some(Sex::F),
            "O" => Some(Sex::O),
            "U" => Some(Sex::U),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    T1w,
    T2w,
    Bold,
    Dwi,
    Flair,
}

impl ScanType {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "T1w" => Some(ScanType::T1w),
            "T2w" => Some(ScanType::T2w),
            "BOLD" => Some(ScanType::Bold),
            "DWI" => Some(ScanType::Dwi),
            "FLAIR" => Some(ScanType::Flair),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScanType::T1w => "T1w",
            ScanType::T2w => "T2w",
            ScanType::Bold => "BOLD",
            ScanType::Dwi => "DWI",
            ScanType::Flair => "FLAIR",
        }
    }
}

impl Default for ScanType {
    fn default() -> Self {
        ScanType::T1w
    }
}

/// Demographic and scan-session metadata for one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub subject_id: String,
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    pub session: Option<String>,
    pub scan_type: ScanType,
    pub acquisition_date: Option<DateTime<Utc>>,
    pub site: Option<String>,
    pub scanner: Option<String>,
}

impl SubjectInfo {
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            age: None,
            sex: None,
            session: None,
            scan_type: ScanType::T1w,
            acquisition_date: None,
            site: None,
            scanner: None,
        }
    }
}
