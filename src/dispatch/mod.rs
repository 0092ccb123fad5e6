//! # External Tool Dispatch
//!
//! Launches the tools around the QC steps:
//!
//! - [`EngineRunner`]: one image-processing engine process per plate, all
//!   plates at once, each with its own [`PlateLog`]
//! - [`LoadDataPlanner`] and [`LoadDataGenerator`]: LoadData CSVs for every
//!   acquisition folder of an export
//!
//! ## Example
//!
//! ```rust,no_run
//! use plateqc::dispatch::EngineRunner;
//! use plateqc::manifest::PlateRun;
//!
//! let runs = vec![
//!     PlateRun::with_loaddata(
//!         "BR00143976",
//!         "pipelines/analysis.cppipe",
//!         "loaddata_csvs/BR00143976_concatenated_with_illum.csv",
//!         "sqlite_outputs/BR00143976",
//!     ),
//! ];
//!
//! let summary = EngineRunner::new("logs", "analysis").run_parallel(&runs)?;
//! for failed in summary.failures() {
//!     eprintln!("{} failed, see {}", failed.plate, failed.log_path.display());
//! }
//! # Ok::<(), plateqc::dispatch::DispatchError>(())
//! ```

mod engine;
mod error;
mod loaddata;
mod plate_log;

#[cfg(test)]
mod tests;

pub use engine::{EngineRunner, RunResult, RunSummary, DEFAULT_ENGINE};
pub use error::DispatchError;
pub use loaddata::{
    IllumOptions, LoadDataGenerator, LoadDataJob, LoadDataPlanner, DEFAULT_GENERATOR, IMAGES_FOLDER,
};
pub use plate_log::PlateLog;
