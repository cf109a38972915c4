use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed metric vocabulary. Ordering here is the canonical
/// "vocabulary order" used by CSV export column ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricKind {
    Snr,
    Cnr,
    Fber,
    Efc,
    FwhmAvg,
    FwhmX,
    FwhmY,
    FwhmZ,
    Qi1,
    Qi2,
    Cjv,
    Wm2max,
    Dvars,
    FdMean,
    FdNum,
    FdPerc,
    Gcor,
    GsrX,
    GsrY,
    OutlierFraction,
}

pub const METRIC_VOCABULARY: [MetricKind; 20] = [
    MetricKind::Snr,
    MetricKind::Cnr,
    MetricKind::Fber,
    MetricKind::Efc,
    MetricKind::FwhmAvg,
    MetricKind::FwhmX,
    MetricKind::FwhmY,
    MetricKind::FwhmZ,
    MetricKind::Qi1,
    MetricKind::Qi2,
    MetricKind::Cjv,
    MetricKind::Wm2max,
    MetricKind::Dvars,
    MetricKind::FdMean,
    MetricKind::FdNum,
    MetricKind::FdPerc,
    MetricKind::Gcor,
    MetricKind::GsrX,
    MetricKind::GsrY,
    MetricKind::OutlierFraction,
];

impl MetricKind {
    /// Case-sensitive CSV column name.
    #[must_use]
    pub fn column_name(self) -> &'static str {
        match self {
            MetricKind::Snr => "snr",
            MetricKind::Cnr => "cnr",
            MetricKind::Fber => "fber",
            MetricKind::Efc => "efc",
            MetricKind::FwhmAvg => "fwhm_avg",
            MetricKind::FwhmX => "fwhm_x",
            MetricKind::FwhmY => "fwhm_y",
            MetricKind::FwhmZ => "fwhm_z",
            MetricKind::Qi1 => "qi1",
            MetricKind::Qi2 => "qi2",
            MetricKind::Cjv => "cjv",
            MetricKind::Wm2max => "wm2max",
            MetricKind::Dvars => "dvars",
            MetricKind::FdMean => "fd_mean",
            MetricKind::FdNum => "fd_num",
            MetricKind::FdPerc => "fd_perc",
            MetricKind::Gcor => "gcor",
            MetricKind::GsrX => "gsr_x",
            MetricKind::GsrY => "gsr_y",
            MetricKind::OutlierFraction => "outlier_fraction",
        }
    }

    #[must_use]
    pub fn from_column_name(name: &str) -> Option<Self> {
        METRIC_VOCABULARY
            .iter()
            .copied()
            .find(|m| m.column_name() == name)
    }

    /// Whether the metric is reported as an integer count (only `fd_num`).
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, MetricKind::FdNum)
    }

    /// Sanity range `[min, max]`, grounded in `original_source/app/models.py`'s
    /// Pydantic `Field(ge=..., le=...)` bounds for `MRIQCMetrics`.
    #[must_use]
    pub fn sane_range(self) -> (f64, f64) {
        match self {
            MetricKind::Snr => (0.0, 1000.0),
            MetricKind::Cnr => (0.0, 100.0),
            MetricKind::Fber => (0.0, 100_000.0),
            MetricKind::Efc => (0.0, 1.0),
            MetricKind::FwhmAvg | MetricKind::FwhmX | MetricKind::FwhmY | MetricKind::FwhmZ => {
                (0.0, 20.0)
            }
            MetricKind::Qi1 | MetricKind::Qi2 => (0.0, 1.0),
            MetricKind::Cjv => (0.0, 10.0),
            MetricKind::Wm2max => (0.0, 1.0),
            MetricKind::Dvars => (0.0, 1000.0),
            MetricKind::FdMean => (0.0, 10.0),
            MetricKind::FdNum => (0.0, f64::MAX),
            MetricKind::FdPerc => (0.0, 100.0),
            MetricKind::Gcor => (-1.0, 1.0),
            MetricKind::GsrX | MetricKind::GsrY => (f64::MIN, f64::MAX),
            MetricKind::OutlierFraction => (0.0, 1.0),
        }
    }

    /// `higher_better` metrics improve as the value increases; used only as a
    /// fallback hint — the authoritative direction always comes from the
    /// resolved `Threshold`, never from this default.
    #[must_use]
    pub fn default_direction(self) -> Direction {
        match self {
            MetricKind::Snr
            | MetricKind::Cnr
            | MetricKind::Fber
            | MetricKind::Qi1
            | MetricKind::Wm2max => Direction::HigherBetter,
            _ => Direction::LowerBetter,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    HigherBetter,
    LowerBetter,
}

/// Raw metric values for one scan session: a dense record with one optional
/// field per vocabulary entry (a dense struct is cheaper than an open-ended
/// string maps on the hot path).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub snr: Option<f64>,
    pub cnr: Option<f64>,
    pub fber: Option<f64>,
    pub efc: Option<f64>,
    pub fwhm_avg: Option<f64>,
    pub fwhm_x: Option<f64>,
    pub fwhm_y: Option<f64>,
    pub fwhm_z: Option<f64>,
    pub qi1: Option<f64>,
    pub qi2: Option<f64>,
    pub cjv: Option<f64>,
    pub wm2max: Option<f64>,
    pub dvars: Option<f64>,
    pub fd_mean: Option<f64>,
    pub fd_num: Option<f64>,
    pub fd_perc: Option<f64>,
    pub gcor: Option<f64>,
    pub gsr_x: Option<f64>,
    pub gsr_y: Option<f64>,
    pub outlier_fraction: Option<f64>,
}

impl Metrics {
    #[must_use]
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Snr => self.snr,
            MetricKind::Cnr => self.cnr,
            MetricKind::Fber => self.fber,
            MetricKind::Efc => self.efc,
            MetricKind::FwhmAvg => self.fwhm_avg,
            MetricKind::FwhmX => self.fwhm_x,
            MetricKind::FwhmY => self.fwhm_y,
            MetricKind::FwhmZ => self.fwhm_z,
            MetricKind::Qi1 => self.qi1,
            MetricKind::Qi2 => self.qi2,
            MetricKind::Cjv => self.cjv,
            MetricKind::Wm2max => self.wm2max,
            MetricKind::Dvars => self.dvars,
            MetricKind::FdMean => self.fd_mean,
            MetricKind::FdNum => self.fd_num,
            MetricKind::FdPerc => self.fd_perc,
            MetricKind::Gcor => self.gcor,
            MetricKind::GsrX => self.gsr_x,
            MetricKind::GsrY => self.gsr_y,
            MetricKind::OutlierFraction => self.outlier_fraction,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: Option<f64>) {
        match kind {
            MetricKind::Snr => self.snr = value,
            MetricKind::Cnr => self.cnr = value,
            MetricKind::Fber => self.fber = value,
            MetricKind::Efc => self.efc = value,
            MetricKind::FwhmAvg => self.fwhm_avg = value,
            MetricKind::FwhmX => self.fwhm_x = value,
            MetricKind::FwhmY => self.fwhm_y = value,
            MetricKind::FwhmZ => self.fwhm_z = value,
            MetricKind::Qi1 => self.qi1 = value,
            MetricKind::Qi2 => self.qi2 = value,
            MetricKind::Cjv => self.cjv = value,
            MetricKind::Wm2max => self.wm2max = value,
            MetricKind::Dvars => self.dvars = value,
            MetricKind::FdMean => self.fd_mean = value,
            MetricKind::FdNum => self.fd_num = value,
            MetricKind::FdPerc => self.fd_perc = value,
            MetricKind::Gcor => self.gcor = value,
            MetricKind::GsrX => self.gsr_x = value,
            MetricKind::GsrY => self.gsr_y = value,
            MetricKind::OutlierFraction => self.outlier_fraction = value,
        }
    }

    /// Iterate over present (metric, value) pairs in vocabulary order.
    pub fn iter_present(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        METRIC_VOCABULARY
            .iter()
            .copied()
            .filter_map(move |k| self.get(k).map(|v| (k, v)))
    }

    /// Cross-field invariants:
    /// (a) if fwhm_x/y/z and fwhm_avg are all present, `|mean(x,y,z) − avg| ≤ 0.5`.
    /// (b) if `fd_num = 0` then `fd_perc` must also be 0.
    pub fn check_consistency(&self) -> Result<(), String> {
        if let (Some(x), Some(y), Some(z), Some(avg)) =
            (self.fwhm_x, self.fwhm_y, self.fwhm_z, self.fwhm_avg)
        {
            let mean = (x + y + z) / 3.0;
            if (mean - avg).abs() > 0.5 {
                return Err(format!(
                    "fwhm_avg ({avg:.3}) inconsistent with mean of fwhm_x/y/z ({mean:.3})"
                ));
            }
        }
        if let (Some(num), Some(perc)) = (self.fd_num, self.fd_perc) {
            if num == 0.0 && perc != 0.0 {
                return Err(format!(
                    "fd_num is 0 but fd_perc is {perc} (expected 0)"
                ));
            }
        }
        Ok(())
    }
}
