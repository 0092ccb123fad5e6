use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use super::detector::OutlierSet;
use super::QcError;
use crate::table::{CompressionType, ObservationTable};

/// File name suffix of cleaned per-plate profiles
pub const CLEANED_SUFFIX: &str = "_cleaned.parquet";

/// Statistics from cleaning one plate
#[derive(Debug, Clone, Serialize)]
pub struct CleaningStats {
    /// Plate identifier
    pub plate: String,
    /// Rows in the full table
    pub rows_before: usize,
    /// Rows removed (union of all outlier sets)
    pub rows_removed: usize,
    /// Rows persisted
    pub rows_after: usize,
    /// Share of rows removed, in percent
    pub percent_removed: f64,
    /// Where the cleaned table was written
    pub output_path: Option<PathBuf>,
    /// Size of the written file in bytes
    pub file_size_bytes: u64,
}

impl fmt::Display for CleaningStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: removed {} of {} rows ({:.2}%), kept {}",
            self.plate, self.rows_removed, self.rows_before, self.percent_removed, self.rows_after
        )
    }
}

/// Union of the row identities of several outlier sets
pub fn union_row_ids(outliers: &[&OutlierSet]) -> BTreeSet<usize> {
    outliers
        .iter()
        .flat_map(|set| set.row_ids().iter().copied())
        .collect()
}

/// Remove every row flagged by any of `outliers` from `table`
pub fn remove_outliers(
    table: &ObservationTable,
    outliers: &[&OutlierSet],
) -> Result<ObservationTable, QcError> {
    Ok(table.drop_rows(&union_row_ids(outliers))?)
}

/// Writes cleaned per-plate profiles into one directory
#[derive(Debug, Clone)]
pub struct CleanedProfileWriter {
    output_dir: PathBuf,
    compression: CompressionType,
}

impl CleanedProfileWriter {
    /// Create a writer; the directory is created if missing
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self, QcError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            compression: CompressionType::default(),
        })
    }

    /// Use a different Parquet compression
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Output path for a plate
    pub fn output_path(&self, plate: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}", plate, CLEANED_SUFFIX))
    }

    /// Remove the union of `outliers` from `table` and persist the rest
    pub fn write(
        &self,
        plate: &str,
        table: &ObservationTable,
        outliers: &[&OutlierSet],
    ) -> Result<CleaningStats, QcError> {
        let cleaned = remove_outliers(table, outliers)?;
        let path = self.output_path(plate);
        let file_size_bytes = cleaned.write_parquet(&path, self.compression)?;

        let rows_before = table.num_rows();
        let rows_after = cleaned.num_rows();
        let rows_removed = rows_before - rows_after;
        let stats = CleaningStats {
            plate: plate.to_string(),
            rows_before,
            rows_removed,
            rows_after,
            percent_removed: percent(rows_removed, rows_before),
            output_path: Some(path),
            file_size_bytes,
        };
        info!("{}", stats);
        Ok(stats)
    }
}

pub(crate) fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
