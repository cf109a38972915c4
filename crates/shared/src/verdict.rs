use serde::{Deserialize, Serialize};

/// One of `pass | warning | fail | uncertain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Warning,
    Fail,
    Uncertain,
}

impl Verdict {
    /// Score used by the composite-score formula.
    #[must_use]
    pub fn score(self) -> f64 {
        match self {
            Verdict::Pass => 1.0,
            Verdict::Warning => 0.6,
            Verdict::Fail => 0.0,
            Verdict::Uncertain => 0.5,
        }
    }

    #[must_use]
    pub fn is_concrete(self) -> bool {
        !matches!(self, Verdict::Uncertain)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Warning => "warning",
            Verdict::Fail => "fail",
            Verdict::Uncertain => "uncertain",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
