//! TOML configuration file support.
//!
//! Every setting can also be given on the command line; flags win over the
//! file. Example:
//!
//! ```toml
//! # plateqc.toml
//! [whole_image]
//! channels = ["OrigDNA", "OrigER", "OrigAGP", "OrigMito", "OrigRNA"]
//! blur_z = 2.5
//! saturation_z = 2.0
//!
//! [[single_cell.conditions]]
//! name = "large_nuclei_high_intensity"
//! features = { Nuclei_AreaShape_Area = 2, Nuclei_Intensity_IntegratedIntensity_CorrDNA = 3 }
//!
//! [[single_cell.conditions]]
//! name = "low_solidity"
//! features = { Nuclei_AreaShape_Solidity = -2 }
//!
//! [reconcile]
//! variant = "with-illum"
//! expected_plates = ["BR00143976", "BR00143977"]
//!
//! [dispatch]
//! log_dir = "logs"
//! ```

use anyhow::{Context, Result};
use plateqc::qc::{FeatureThresholds, QcCondition, ThresholdPolicy};
use plateqc::reconcile::ReconcileVariant;
use plateqc::table::columns;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure for plateqc.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Whole-image calibration settings.
    #[serde(default)]
    pub whole_image: WholeImageConfig,

    /// Single-cell cleaning settings.
    #[serde(default)]
    pub single_cell: SingleCellConfig,

    /// LoadData reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// External tool settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// One whole-image metric to calibrate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricConfig {
    /// Metric base name, without the channel suffix.
    pub name: String,

    /// Unsigned deviation multiplier.
    pub z: f64,

    /// Which cutoffs to derive.
    #[serde(default)]
    pub policy: ThresholdPolicy,
}

/// Configuration for the calibrate command.
#[derive(Debug, Default, Deserialize)]
pub struct WholeImageConfig {
    /// Channel suffixes of the metric columns.
    pub channels: Option<Vec<String>>,

    /// Metrics to calibrate; replaces the blur and saturation defaults.
    pub metrics: Option<Vec<MetricConfig>>,

    /// Multiplier for the blur metric.
    pub blur_z: Option<f64>,

    /// Multiplier for the saturation metric.
    pub saturation_z: Option<f64>,

    /// Decimal places of the reported cutoffs.
    pub decimals: Option<u32>,
}

/// Configuration for the clean command.
#[derive(Debug, Default, Deserialize)]
pub struct SingleCellConfig {
    /// Outlier conditions; rows flagged by any of them are removed.
    pub conditions: Option<Vec<QcCondition>>,

    /// Metadata columns carried into outlier reports.
    pub metadata_columns: Option<Vec<String>>,

    /// ZSTD compression level of cleaned profiles.
    pub compression_level: Option<i32>,
}

/// Configuration for the reconcile command.
#[derive(Debug, Default, Deserialize)]
pub struct ReconcileConfig {
    /// Plate identifier regular expression.
    pub pattern: Option<String>,

    /// File name marker of re-imaged tables.
    pub reimaged_marker: Option<String>,

    /// Which LoadData CSVs are reconciled.
    pub variant: Option<ReconcileVariant>,

    /// Plates reported even when no file matches them.
    pub expected_plates: Option<Vec<String>>,

    /// Delete source CSVs after a clean run.
    pub remove_sources: Option<bool>,
}

/// Configuration for the run and loaddata commands.
#[derive(Debug, Default, Deserialize)]
pub struct DispatchConfig {
    /// Image-processing engine executable.
    pub engine: Option<String>,

    /// LoadData generator executable.
    pub generator: Option<String>,

    /// Directory of per-plate run logs.
    pub log_dir: Option<PathBuf>,

    /// Tag of the run in log file names.
    pub run_name: Option<String>,

    /// Upper bound on simultaneous engine runs.
    pub max_workers: Option<usize>,
}

/// Blur metric of the engine's image quality module.
pub const BLUR_METRIC: &str = "ImageQuality_PowerLogLogSlope";
/// Saturation metric of the engine's image quality module.
pub const SATURATION_METRIC: &str = "ImageQuality_PercentMaximal";
/// Channels of the Cell Painting assay.
pub const DEFAULT_CHANNELS: [&str; 5] = ["OrigDNA", "OrigER", "OrigAGP", "OrigMito", "OrigRNA"];

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Load the file if one was given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }
}

impl WholeImageConfig {
    /// Channels, falling back to the Cell Painting channels.
    pub fn channels(&self) -> Vec<String> {
        self.channels
            .clone()
            .unwrap_or_else(|| DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect())
    }

    /// Metrics to calibrate: two-sided blur and upper-only saturation unless
    /// configured otherwise.
    pub fn metrics(&self, blur_z: Option<f64>, saturation_z: Option<f64>) -> Vec<MetricConfig> {
        if let Some(metrics) = &self.metrics {
            return metrics.clone();
        }
        vec![
            MetricConfig {
                name: BLUR_METRIC.to_string(),
                z: blur_z.or(self.blur_z).unwrap_or(2.5),
                policy: ThresholdPolicy::TwoSided,
            },
            MetricConfig {
                name: SATURATION_METRIC.to_string(),
                z: saturation_z.or(self.saturation_z).unwrap_or(2.0),
                policy: ThresholdPolicy::UpperOnly,
            },
        ]
    }
}

impl SingleCellConfig {
    /// Conditions, falling back to large bright nuclei and low solidity.
    pub fn conditions(&self) -> Result<Vec<QcCondition>> {
        if let Some(conditions) = &self.conditions {
            return Ok(conditions.clone());
        }
        Ok(vec![
            QcCondition {
                name: "large_nuclei_high_intensity".to_string(),
                features: FeatureThresholds::new()
                    .with("Nuclei_AreaShape_Area", 2.0)?
                    .with("Nuclei_Intensity_IntegratedIntensity_CorrDNA", 3.0)?,
            },
            QcCondition {
                name: "low_nuclei_solidity".to_string(),
                features: FeatureThresholds::new().with("Nuclei_AreaShape_Solidity", -2.0)?,
            },
        ])
    }

    /// Metadata columns, falling back to the converted profile layout.
    pub fn metadata_columns(&self) -> Vec<String> {
        self.metadata_columns.clone().unwrap_or_else(|| {
            [
                columns::IMAGE_PLATE,
                columns::IMAGE_WELL,
                columns::IMAGE_SITE,
                "Metadata_Nuclei_Location_Center_X",
                "Metadata_Nuclei_Location_Center_Y",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect()
        })
    }
}
