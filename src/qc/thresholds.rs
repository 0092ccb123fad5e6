use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::QcError;

/// Which tail of the distribution a feature condition flags
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TailCondition {
    /// Flag rows whose score is strictly greater than the bound
    Above(f64),
    /// Flag rows whose score is strictly less than the bound
    Below(f64),
}

impl TailCondition {
    /// Condition for a signed multiplier: positive flags the upper tail,
    /// negative the lower tail
    pub fn from_multiplier(multiplier: f64) -> Self {
        if multiplier > 0.0 {
            TailCondition::Above(multiplier)
        } else {
            TailCondition::Below(multiplier)
        }
    }

    /// Returns true if a standardized score violates the condition
    pub fn is_violated_by(&self, z: f64) -> bool {
        match *self {
            TailCondition::Above(bound) => z > bound,
            TailCondition::Below(bound) => z < bound,
        }
    }
}

/// Feature name to signed deviation multiplier
///
/// A row is an outlier only if it violates the condition of *every* feature
/// listed. Zero and non-finite multipliers are rejected.
///
/// Deserializes from a TOML/JSON table:
///
/// ```toml
/// Nuclei_AreaShape_Area = 2
/// Nuclei_Intensity_IntegratedIntensity_CorrDNA = 3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct FeatureThresholds {
    entries: BTreeMap<String, f64>,
}

impl FeatureThresholds {
    /// Create an empty specification
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a feature's multiplier
    pub fn with(mut self, feature: &str, multiplier: f64) -> Result<Self, QcError> {
        self.insert(feature, multiplier)?;
        Ok(self)
    }

    /// Add (or replace) a feature's multiplier in place
    pub fn insert(&mut self, feature: &str, multiplier: f64) -> Result<(), QcError> {
        if multiplier == 0.0 || !multiplier.is_finite() {
            return Err(QcError::InvalidMultiplier {
                feature: feature.to_string(),
                multiplier,
            });
        }
        self.entries.insert(feature.to_string(), multiplier);
        Ok(())
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no feature is listed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feature names, sorted
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Features with their tail conditions
    pub fn conditions(&self) -> impl Iterator<Item = (&str, TailCondition)> {
        self.entries
            .iter()
            .map(|(feature, &m)| (feature.as_str(), TailCondition::from_multiplier(m)))
    }

    /// Multiplier configured for a feature
    pub fn multiplier(&self, feature: &str) -> Option<f64> {
        self.entries.get(feature).copied()
    }
}

impl TryFrom<BTreeMap<String, f64>> for FeatureThresholds {
    type Error = QcError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        map.into_iter()
            .try_fold(Self::new(), |acc, (feature, m)| acc.with(&feature, m))
    }
}

impl From<FeatureThresholds> for BTreeMap<String, f64> {
    fn from(thresholds: FeatureThresholds) -> Self {
        thresholds.entries
    }
}

/// A named threshold specification, e.g. one defect category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcCondition {
    /// Name used in logs and reports
    pub name: String,
    /// Features and multipliers, AND-combined
    pub features: FeatureThresholds,
}
