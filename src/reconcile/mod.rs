//! # Re-imaged Plate Reconciliation
//!
//! Wells that fail the first acquisition are imaged again, producing a second
//! LoadData CSV for the same plate. This module merges the original and
//! re-imaged CSVs of every plate into one table per plate, keeping the
//! re-imaged row wherever both acquisitions cover the same (well, site).
//!
//! ## Workflow
//!
//! 1. [`Reconciler::discover`] lists the CSV inputs of a directory
//! 2. [`plan_batch`] groups them by the plate identifier in their file names
//! 3. [`reconcile_plate`] merges each group
//! 4. [`unaccounted_rows`] checks that no input row was silently lost
//!
//! ## Usage
//!
//! ```rust,no_run
//! use plateqc::reconcile::{ReconcileVariant, Reconciler};
//!
//! let reconciler = Reconciler::new("loaddata_csvs", ReconcileVariant::WithIllum);
//! let inputs = reconciler.discover("loaddata_csvs")?;
//! let outcome = reconciler.run(&inputs)?;
//! println!("{}", outcome.report);
//! if outcome.data_loss.is_clean() {
//!     outcome.remove_sources()?;
//! }
//! # Ok::<(), plateqc::reconcile::ReconcileError>(())
//! ```

mod batch;
mod error;
mod merge;
pub mod plate_id;
mod report;
mod verify;

#[cfg(test)]
mod tests;

pub use batch::{plan_batch, BatchPlan, PlannedFile};
pub use error::ReconcileError;
pub use merge::{reconcile_plate, ReconciledPlate, SourceTable};
pub use plate_id::{FolderNaming, PlateIdPattern};
pub use report::{CheckStatus, PlateCounts, ReconcileCheck, ReconcileReport};
pub use verify::{unaccounted_rows, DataLossReport};

use std::fs;
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::table::{columns, ObservationTable, TableError};

/// Suffix shared by every reconciled output
pub const CONCATENATED_MARKER: &str = "_concatenated";

/// Which LoadData CSVs are being reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileVariant {
    /// Plain image manifests; columns follow the first input of each plate
    #[default]
    Original,
    /// Manifests that also reference illumination correction functions;
    /// columns follow the reference table and rows are ordered by
    /// (column, row, site)
    WithIllum,
}

impl ReconcileVariant {
    /// File name suffix of reconciled outputs
    pub fn output_suffix(self) -> &'static str {
        match self {
            ReconcileVariant::Original => "_concatenated.csv",
            ReconcileVariant::WithIllum => "_concatenated_with_illum.csv",
        }
    }

    /// Columns the reconciled rows are sorted on
    pub fn order_by(self) -> &'static [&'static str] {
        match self {
            ReconcileVariant::Original => &[],
            ReconcileVariant::WithIllum => &[columns::COL, columns::ROW, columns::SITE],
        }
    }

    fn reference_marker(self) -> Option<&'static str> {
        match self {
            ReconcileVariant::Original => None,
            ReconcileVariant::WithIllum => Some("with_illum"),
        }
    }
}

/// Result of one reconciliation batch
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Reconciled CSVs written, in plate order
    pub outputs: Vec<PathBuf>,
    /// Per-plate checks
    pub report: ReconcileReport,
    /// Unused inputs and lost rows
    pub data_loss: DataLossReport,
    /// Every input considered
    pub inputs: Vec<PathBuf>,
    /// Inputs of plates whose output holds every input row
    pub reconciled_inputs: Vec<PathBuf>,
}

impl ReconcileOutcome {
    /// Delete the input CSVs so downstream runs only see reconciled outputs
    ///
    /// Refuses to delete anything while unused inputs exist. Only inputs of
    /// plates whose output holds every input row are removed; the inputs of
    /// failed or lossy plates stay for a re-run. Returns the number of files
    /// removed.
    pub fn remove_sources(&self) -> Result<usize, ReconcileError> {
        if !self.data_loss.unused_files.is_empty() {
            return Err(ReconcileError::UnusedInputs(
                self.data_loss.unused_files.len(),
            ));
        }
        let mut removed = 0;
        for path in &self.reconciled_inputs {
            if self.outputs.contains(path) {
                continue;
            }
            fs::remove_file(path)?;
            info!("Removed: {}", path.display());
            removed += 1;
        }
        let kept = self.inputs.len() - self.reconciled_inputs.len();
        if kept > 0 {
            warn!("Kept {} input(s) of plates that were not fully reconciled", kept);
        }
        Ok(removed)
    }
}

/// Reconciles a directory of LoadData CSVs, one output per plate
#[derive(Debug, Clone)]
pub struct Reconciler {
    pattern: PlateIdPattern,
    variant: ReconcileVariant,
    expected_plates: Vec<String>,
    output_dir: PathBuf,
}

impl Reconciler {
    /// Reconciler writing to `output_dir` with the default plate pattern
    pub fn new<P: AsRef<Path>>(output_dir: P, variant: ReconcileVariant) -> Self {
        Self {
            pattern: PlateIdPattern::default(),
            variant,
            expected_plates: Vec::new(),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Use a custom plate identifier pattern
    pub fn with_pattern(mut self, pattern: PlateIdPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Plates that must be reported even when no input matches them
    pub fn with_expected_plates(mut self, plates: Vec<String>) -> Self {
        self.expected_plates = plates;
        self
    }

    /// Output path for a plate
    pub fn output_path(&self, plate_id: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{}", plate_id, self.variant.output_suffix()))
    }

    /// CSV files of `dir`, sorted by name, excluding reconciled outputs
    pub fn discover<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>, ReconcileError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if is_csv && !batch::file_name(&path).contains(CONCATENATED_MARKER) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Reconcile every plate found in `inputs`
    ///
    /// A plate that fails (unreadable input, missing reference column) is
    /// reported and skipped; the remaining plates are still written.
    pub fn run(&self, inputs: &[PathBuf]) -> Result<ReconcileOutcome, ReconcileError> {
        fs::create_dir_all(&self.output_dir)?;
        let plan = plan_batch(inputs, &self.pattern, &self.expected_plates);
        info!(
            "Found {} plate(s): {}",
            plan.groups.len(),
            plan.groups
                .iter()
                .map(|(id, _)| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let reference = self.reference_schema(&plan)?;
        let mut report = ReconcileReport::default();
        let mut data_loss = DataLossReport::default();
        let mut outputs = Vec::new();
        let mut reconciled_inputs = Vec::new();

        for (plate_id, files) in &plan.groups {
            if files.is_empty() {
                warn!("No files found for {}", plate_id);
                report.add_check(ReconcileCheck::skipped(plate_id, "no input files"));
                continue;
            }
            match self.reconcile_group(plate_id, files, reference.as_ref()) {
                Ok((path, counts, lost)) => {
                    if lost.is_empty() {
                        reconciled_inputs.extend(files.iter().map(|f| f.path.clone()));
                    } else {
                        warn!("{}: {} input row(s) missing from output", plate_id, lost.len());
                        data_loss.unaccounted_rows.extend(lost);
                    }
                    info!(
                        "Saved: {} ({} rows, {} superseded)",
                        path.display(),
                        counts.rows_out,
                        counts.superseded
                    );
                    report.add_check(ReconcileCheck::written(plate_id, counts));
                    outputs.push(path);
                }
                Err(e) => {
                    warn!("{}: {}", plate_id, e);
                    report.add_check(ReconcileCheck::failed(plate_id, e.to_string()));
                }
            }
        }

        if plan.unused.is_empty() {
            info!("All files were successfully used.");
        } else {
            warn!("Some files were not used in the concatenation!");
            for path in &plan.unused {
                warn!("Unused: {}", path.display());
                report.add_check(ReconcileCheck::skipped(
                    batch::file_name(path),
                    "no plate identifier in file name",
                ));
            }
        }
        data_loss.unused_files = plan.unused;

        Ok(ReconcileOutcome {
            outputs,
            report,
            data_loss,
            inputs: inputs.to_vec(),
            reconciled_inputs,
        })
    }

    fn reconcile_group(
        &self,
        plate_id: &str,
        files: &[PlannedFile],
        reference: Option<&SchemaRef>,
    ) -> Result<(PathBuf, PlateCounts, Vec<(PathBuf, usize)>), ReconcileError> {
        let sources = files
            .iter()
            .map(|f| SourceTable::load(f.path.clone(), f.reimaged))
            .collect::<Result<Vec<_>, _>>()?;

        let plate = reconcile_plate(plate_id, &sources, reference, self.variant.order_by())?
            .ok_or(TableError::Empty)?;
        let lost = unaccounted_rows(&sources, &plate.table)?;
        let counts = PlateCounts {
            files: sources.len(),
            rows_in: plate.rows_in,
            rows_out: plate.table.num_rows(),
            reimaged_rows: plate
                .table
                .flag_values(columns::REIMAGED)?
                .into_iter()
                .filter(|&r| r)
                .count(),
            superseded: plate.duplicates_dropped,
            missing: lost.len(),
        };

        let path = self.output_path(plate_id);
        plate.table.write_csv(&path)?;
        Ok((path, counts, lost))
    }

    /// Column order shared by every plate of a correction-aware batch
    ///
    /// Taken from the first original (not re-imaged) input carrying the
    /// variant's marker, in plate order.
    fn reference_schema(&self, plan: &BatchPlan) -> Result<Option<SchemaRef>, ReconcileError> {
        let Some(marker) = self.variant.reference_marker() else {
            return Ok(None);
        };
        let candidate = plan
            .used()
            .find(|f| !f.reimaged && batch::file_name(&f.path).contains(marker));
        match candidate {
            Some(file) => {
                info!("Column order taken from {}", file.path.display());
                Ok(Some(ObservationTable::from_csv(&file.path)?.schema()))
            }
            None => {
                warn!(
                    "No original '{}' table found; each plate keeps the column order of its first input",
                    marker
                );
                Ok(None)
            }
        }
    }
}
