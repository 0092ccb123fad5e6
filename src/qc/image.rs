//! Whole-image QC tables.
//!
//! The engine writes one row per image set with one metric column per
//! channel (`ImageQuality_PowerLogLogSlope_OrigDNA`, ...). Cutoffs are
//! calibrated over all channels and plates together, so the wide tables are
//! stacked into a long one with a `Channel` column.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use serde::Serialize;

use super::cleaning::percent;
use super::detector::OutlierSet;
use super::QcError;
use crate::table::{columns, ObservationTable};

/// Stack one plate's wide per-image table into one block per channel
///
/// Each block holds the metadata columns, one `Float64` column per metric
/// named by its base name, `Channel`, and `Metadata_Plate` set to `plate`.
pub fn stack_channels<S: AsRef<str>>(
    plate: &str,
    table: &ObservationTable,
    channels: &[S],
    metrics: &[S],
) -> Result<ObservationTable, QcError> {
    let metadata: Vec<String> = table
        .metadata_columns()
        .into_iter()
        .filter(|name| name != columns::PLATE)
        .collect();
    let base = table.select(&metadata)?;
    let rows = table.num_rows();

    let mut blocks = Vec::with_capacity(channels.len());
    for channel in channels {
        let channel = channel.as_ref();
        let mut block = base.clone();
        for metric in metrics {
            let metric = metric.as_ref();
            let values: ArrayRef =
                Arc::new(table.float_column(&format!("{}_{}", metric, channel))?);
            block = block.with_column(metric, values)?;
        }
        let channel_values: ArrayRef = Arc::new(StringArray::from(vec![channel; rows]));
        let plate_values: ArrayRef = Arc::new(StringArray::from(vec![plate; rows]));
        block = block
            .with_column(columns::CHANNEL, channel_values)?
            .with_column(columns::PLATE, plate_values)?;
        blocks.push(block);
    }

    Ok(ObservationTable::concat(&blocks)?)
}

/// Stack several plates; later plates are aligned to the first plate's schema
pub fn stack_plates<S: AsRef<str>>(
    plates: &[(String, ObservationTable)],
    channels: &[S],
    metrics: &[S],
) -> Result<ObservationTable, QcError> {
    let mut stacked: Vec<ObservationTable> = Vec::with_capacity(plates.len());
    for (plate, table) in plates {
        let block = stack_channels(plate, table, channels, metrics)?;
        let block = match stacked.first() {
            Some(first) => block.align_to(&first.schema())?,
            None => block,
        };
        stacked.push(block);
    }
    Ok(ObservationTable::concat(&stacked)?)
}

/// How much of the acquisition an outlier set would remove
#[derive(Debug, Clone, Serialize)]
pub struct RemovalSummary {
    /// Unique (plate, well, site) combinations in the table
    pub total_combinations: usize,
    /// Unique combinations with at least one flagged row
    pub removed_combinations: usize,
    /// Share removed, in percent
    pub percent_removed: f64,
    /// Flagged rows per channel
    pub per_channel: BTreeMap<String, usize>,
}

/// Summarize the outliers of a stacked whole-image table
///
/// `outliers` must have been detected on `table` itself.
pub fn removal_summary(
    table: &ObservationTable,
    outliers: &OutlierSet,
) -> Result<RemovalSummary, QcError> {
    let plates = table.string_values(columns::PLATE)?;
    let wells = table.string_values(columns::WELL)?;
    let sites = table.string_values(columns::SITE)?;
    let channels = if table.has_column(columns::CHANNEL) {
        Some(table.string_values(columns::CHANNEL)?)
    } else {
        None
    };

    let mut all = BTreeSet::new();
    let mut removed = BTreeSet::new();
    let mut per_channel = BTreeMap::new();

    for (i, row_id) in table.row_ids().iter().enumerate() {
        let key = (plates[i].clone(), wells[i].clone(), sites[i].clone());
        if outliers.contains(*row_id) {
            removed.insert(key.clone());
            if let Some(channel) = channels.as_ref().and_then(|c| c[i].clone()) {
                *per_channel.entry(channel).or_insert(0) += 1;
            }
        }
        all.insert(key);
    }

    Ok(RemovalSummary {
        total_combinations: all.len(),
        removed_combinations: removed.len(),
        percent_removed: percent(removed.len(), all.len()),
        per_channel,
    })
}
