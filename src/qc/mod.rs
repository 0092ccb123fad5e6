//! # Quality Control
//!
//! z-score gating of whole images and segmented single cells.
//!
//! - [`find_outliers`]: rows violating *every* condition of a
//!   [`FeatureThresholds`] specification (signed multipliers, AND-combined)
//! - [`detect_two_sided`]: rows whose absolute score on one feature exceeds a
//!   multiplier
//! - [`calibrate`]: `mean ± z * std` cutoffs for the image-processing
//!   engine's configuration
//! - [`CleanedProfileWriter`]: removes the union of outlier sets and persists
//!   the cleaned plate
//! - [`image`]: stacking of per-channel whole-image metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use plateqc::qc::{find_outliers, CleanedProfileWriter, FeatureThresholds};
//! use plateqc::table::ObservationTable;
//!
//! let plate = ObservationTable::open("BR00143976_converted.parquet")?;
//!
//! let large_nuclei = FeatureThresholds::new()
//!     .with("Nuclei_AreaShape_Area", 2.0)?
//!     .with("Nuclei_Intensity_IntegratedIntensity_CorrDNA", 3.0)?;
//! let low_solidity = FeatureThresholds::new().with("Nuclei_AreaShape_Solidity", -2.0)?;
//!
//! let metadata = ["Image_Metadata_Well", "Image_Metadata_Site"];
//! let a = find_outliers(&plate, &large_nuclei, &metadata)?;
//! let b = find_outliers(&plate, &low_solidity, &metadata)?;
//!
//! let writer = CleanedProfileWriter::new("cleaned_profiles")?;
//! let stats = writer.write("BR00143976", &plate, &[&a, &b])?;
//! println!("{}", stats);
//! # Ok::<(), plateqc::qc::QcError>(())
//! ```

mod calibrator;
mod cleaning;
mod detector;
mod error;
pub mod image;
mod moments;
mod thresholds;

#[cfg(test)]
mod tests;

pub use calibrator::{calibrate, round_to, Cutoffs, ThresholdPolicy};
pub use cleaning::{remove_outliers, union_row_ids, CleanedProfileWriter, CleaningStats, CLEANED_SUFFIX};
pub use detector::{detect_two_sided, find_outliers, OutlierSet};
pub use error::QcError;
pub use moments::{z_scores, Deviation, Moments};
pub use thresholds::{FeatureThresholds, QcCondition, TailCondition};
