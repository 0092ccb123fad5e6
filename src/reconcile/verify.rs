use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;

use super::merge::SourceTable;
use super::ReconcileError;
use crate::table::{columns, ObservationTable};

/// Inputs that did not make it into any reconciled output
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataLossReport {
    /// Files whose name matched no plate identifier
    pub unused_files: Vec<PathBuf>,
    /// Rows (file, 0-based data row) whose (well, site) is absent from the
    /// output of their plate
    pub unaccounted_rows: Vec<(PathBuf, usize)>,
}

impl DataLossReport {
    /// Returns true if every input file and row is accounted for
    pub fn is_clean(&self) -> bool {
        self.unused_files.is_empty() && self.unaccounted_rows.is_empty()
    }
}

/// Rows of `sources` whose (well, site) does not appear in `output`
///
/// A row superseded by a re-imaged row of the same (well, site) counts as
/// accounted for.
pub fn unaccounted_rows(
    sources: &[SourceTable],
    output: &ObservationTable,
) -> Result<Vec<(PathBuf, usize)>, ReconcileError> {
    let keys = [columns::WELL, columns::SITE];
    let output_keys = output.select(&keys)?;
    let present: HashSet<(Option<String>, Option<String>)> = row_keys(&output_keys)?.collect();

    let mut missing = Vec::new();
    for source in sources {
        let source_keys = source.table.select(&keys)?.align_to(&output_keys.schema())?;
        for (row, key) in row_keys(&source_keys)?.enumerate() {
            if !present.contains(&key) {
                missing.push((source.path.clone(), row));
            }
        }
    }
    Ok(missing)
}

fn row_keys(
    table: &ObservationTable,
) -> Result<impl Iterator<Item = (Option<String>, Option<String>)>, ReconcileError> {
    let wells = table.string_values(columns::WELL)?;
    let sites = table.string_values(columns::SITE)?;
    Ok(wells.into_iter().zip(sites))
}
