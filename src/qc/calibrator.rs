use std::fmt;

use arrow::array::Array;
use serde::{Deserialize, Serialize};

use super::moments::{Deviation, Moments};
use super::QcError;
use crate::table::ObservationTable;

/// Which cutoffs a metric needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdPolicy {
    /// Both tails are defective (blur-style metrics)
    #[default]
    TwoSided,
    /// Only excessively high values are defective (saturation-style metrics)
    UpperOnly,
}

/// Cutoffs in the feature's own units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutoffs {
    /// Feature the cutoffs apply to
    pub feature: String,
    /// Deviation multiplier used
    pub multiplier: f64,
    /// Column mean
    pub mean: f64,
    /// Column sample standard deviation
    pub std_dev: f64,
    /// `mean + multiplier * std_dev`
    pub upper: f64,
    /// `mean - multiplier * std_dev`, for two-sided policies
    pub lower: Option<f64>,
}

impl Cutoffs {
    /// Cutoffs rounded to `decimals` places for external configuration
    pub fn rounded(&self, decimals: u32) -> Self {
        Self {
            upper: round_to(self.upper, decimals),
            lower: self.lower.map(|v| round_to(v, decimals)),
            ..self.clone()
        }
    }
}

impl fmt::Display for Cutoffs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (z = {}): above {}", self.feature, self.multiplier, self.upper)?;
        if let Some(lower) = self.lower {
            write!(f, ", below {}", lower)?;
        }
        Ok(())
    }
}

/// Round half away from zero
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Derive `mean ± multiplier * std_dev` cutoffs over the full column
///
/// Uses the sample standard deviation; nulls are skipped. `multiplier` is
/// unsigned and must be positive.
pub fn calibrate(
    table: &ObservationTable,
    feature: &str,
    multiplier: f64,
    policy: ThresholdPolicy,
) -> Result<Cutoffs, QcError> {
    if multiplier <= 0.0 || !multiplier.is_finite() {
        return Err(QcError::InvalidMultiplier {
            feature: feature.to_string(),
            multiplier,
        });
    }

    let values = table.float_column(feature)?;
    let moments = Moments::from_values(&values, Deviation::Sample).ok_or_else(|| {
        QcError::InsufficientData {
            feature: feature.to_string(),
            count: values.len() - values.null_count(),
            required: Moments::required(Deviation::Sample),
        }
    })?;

    let spread = multiplier * moments.std_dev;
    Ok(Cutoffs {
        feature: feature.to_string(),
        multiplier,
        mean: moments.mean,
        std_dev: moments.std_dev,
        upper: moments.mean + spread,
        lower: match policy {
            ThresholdPolicy::TwoSided => Some(moments.mean - spread),
            ThresholdPolicy::UpperOnly => None,
        },
    })
}
