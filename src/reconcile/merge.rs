use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::{lexsort_to_indices, SortColumn, SortOptions};
use arrow::datatypes::SchemaRef;
use log::debug;

use super::ReconcileError;
use crate::table::{columns, ObservationTable};

/// One loaded input table of a plate
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// File the table was read from
    pub path: PathBuf,
    /// Whether the file holds a repeat acquisition
    pub reimaged: bool,
    /// Table contents
    pub table: ObservationTable,
}

impl SourceTable {
    /// Load a CSV source
    pub fn load(path: PathBuf, reimaged: bool) -> Result<Self, ReconcileError> {
        let table = ObservationTable::from_csv(&path)?;
        Ok(Self {
            path,
            reimaged,
            table,
        })
    }
}

/// Reconciled table of one logical plate
#[derive(Debug, Clone)]
pub struct ReconciledPlate {
    /// Plate identifier
    pub plate_id: String,
    /// Deduplicated rows
    pub table: ObservationTable,
    /// Rows across all inputs
    pub rows_in: usize,
    /// Rows dropped because an earlier row had the same (well, site)
    pub duplicates_dropped: usize,
}

/// Merge the tables of one plate, preferring re-imaged rows
///
/// Every input is aligned to `reference` (or to the first input when there
/// is no reference) and flagged with `Metadata_Reimaged`. Rows are stably
/// ordered re-imaged first, and the first row of each (well, site) is kept.
/// When `order_by` is non-empty the result is then sorted ascending on those
/// columns. Returns `None` for an empty input set.
pub fn reconcile_plate(
    plate_id: &str,
    sources: &[SourceTable],
    reference: Option<&SchemaRef>,
    order_by: &[&str],
) -> Result<Option<ReconciledPlate>, ReconcileError> {
    let Some(first) = sources.first() else {
        return Ok(None);
    };
    let schema = reference.cloned().unwrap_or_else(|| first.table.schema());

    let flagged = sources
        .iter()
        .map(|source| {
            let flags: ArrayRef = Arc::new(BooleanArray::from(vec![
                source.reimaged;
                source.table.num_rows()
            ]));
            Ok(source
                .table
                .align_to(&schema)?
                .with_column(columns::REIMAGED, flags)?)
        })
        .collect::<Result<Vec<_>, ReconcileError>>()?;
    let combined = ObservationTable::concat(&flagged)?;

    let reimaged = combined.flag_values(columns::REIMAGED)?;
    let mut order: Vec<usize> = (0..combined.num_rows()).collect();
    order.sort_by_key(|&i| !reimaged[i]);

    let wells = combined.string_values(columns::WELL)?;
    let sites = combined.string_values(columns::SITE)?;
    let mut seen = HashSet::with_capacity(order.len());
    let kept: Vec<usize> = order
        .into_iter()
        .filter(|&i| seen.insert((wells[i].clone(), sites[i].clone())))
        .collect();

    let mut table = combined.take(&kept)?;
    if !order_by.is_empty() {
        table = sort_ascending(&table, order_by)?;
    }

    let rows_in = combined.num_rows();
    let duplicates_dropped = rows_in - table.num_rows();
    debug!(
        "{}: {} rows in, {} duplicate (well, site) rows dropped",
        plate_id, rows_in, duplicates_dropped
    );

    Ok(Some(ReconciledPlate {
        plate_id: plate_id.to_string(),
        table,
        rows_in,
        duplicates_dropped,
    }))
}

fn sort_ascending(
    table: &ObservationTable,
    order_by: &[&str],
) -> Result<ObservationTable, ReconcileError> {
    let sort_columns = order_by
        .iter()
        .map(|name| {
            Ok(SortColumn {
                values: table.column(name)?.clone(),
                options: Some(SortOptions {
                    descending: false,
                    nulls_first: false,
                }),
            })
        })
        .collect::<Result<Vec<_>, ReconcileError>>()?;

    let indices = lexsort_to_indices(&sort_columns, None)?;
    let positions: Vec<usize> = indices.values().iter().map(|&i| i as usize).collect();
    Ok(table.take(&positions)?)
}
