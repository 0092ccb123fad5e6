//! # plateqc - Quality Control for High-Content Screening
//!
//! `plateqc` covers the quality-control half of a Cell Painting style image
//! analysis workflow: everything between the image-processing engine's raw
//! measurement tables and the profiles handed to downstream analysis.
//!
//! ## Key Features
//!
//! - **Outlier Detection**: z-score gating of images or single cells with
//!   signed, per-feature multipliers combined with logical AND.
//!
//! - **Threshold Calibration**: `mean ± z * std` cutoffs for the engine's
//!   image quality flags (two-sided blur, upper-only saturation).
//!
//! - **Re-imaged Plate Reconciliation**: merges LoadData CSVs of repeat
//!   acquisitions into their original plates, preferring re-imaged wells, and
//!   verifies that no input row was lost.
//!
//! - **Cleaned Profiles**: removes the union of outlier sets and persists
//!   each plate as ZSTD-compressed Parquet.
//!
//! - **Engine Dispatch**: one engine process per plate with per-plate run
//!   logs, plus LoadData CSV generation for every acquisition folder.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plateqc::prelude::*;
//!
//! let plate = ObservationTable::open("BR00143976_converted.parquet")?;
//!
//! let large_nuclei = FeatureThresholds::new()
//!     .with("Nuclei_AreaShape_Area", 2.0)?
//!     .with("Nuclei_Intensity_IntegratedIntensity_CorrDNA", 3.0)?;
//! let outliers = find_outliers(&plate, &large_nuclei, &["Image_Metadata_Well"])?;
//!
//! let stats = CleanedProfileWriter::new("cleaned_profiles")?
//!     .write("BR00143976", &plate, &[&outliers])?;
//! println!("{}", stats);
//! # Ok::<(), QcError>(())
//! ```
//!
//! ## Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`table`]: Observation tables with stable row identities, CSV/Parquet I/O
//! - [`qc`]: Outlier detection, calibration, cleaning, whole-image stacking
//! - [`reconcile`]: Re-imaged LoadData CSV reconciliation
//! - [`manifest`]: Typed engine runs and profile manifests
//! - [`dispatch`]: Engine and LoadData generator subprocesses

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod dispatch;
pub mod manifest;
pub mod qc;
pub mod reconcile;
pub mod table;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::dispatch::{EngineRunner, PlateLog, RunSummary};
    pub use crate::manifest::{PlateRun, ProfileManifest, RunInput};
    pub use crate::qc::{
        calibrate, detect_two_sided, find_outliers, CleanedProfileWriter, CleaningStats, Cutoffs,
        FeatureThresholds, OutlierSet, QcError, ThresholdPolicy,
    };
    pub use crate::reconcile::{ReconcileVariant, Reconciler};
    pub use crate::table::{CompressionType, ObservationTable};
}
