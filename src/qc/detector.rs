use std::collections::BTreeSet;

use arrow::array::{Array, BooleanArray};
use log::{debug, warn};

use super::moments::{Deviation, Moments};
use super::thresholds::{FeatureThresholds, TailCondition};
use super::QcError;
use crate::table::ObservationTable;

/// Rows flagged by a threshold specification
#[derive(Debug, Clone)]
pub struct OutlierSet {
    row_ids: BTreeSet<usize>,
    table: ObservationTable,
}

impl OutlierSet {
    fn from_table(table: ObservationTable) -> Self {
        let row_ids = table.row_ids().iter().copied().collect();
        Self { row_ids, table }
    }

    /// Identities of the flagged rows in the table they were detected on
    pub fn row_ids(&self) -> &BTreeSet<usize> {
        &self.row_ids
    }

    /// Flagged rows restricted to the requested columns
    pub fn table(&self) -> &ObservationTable {
        &self.table
    }

    /// Number of flagged rows
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    /// Returns true if nothing was flagged
    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Returns true if the row with this identity was flagged
    pub fn contains(&self, row_id: usize) -> bool {
        self.row_ids.contains(&row_id)
    }
}

/// Find the rows that violate every feature condition of `thresholds`
///
/// Scores use the mean and population standard deviation of the whole
/// table. A feature with zero spread (or no usable values) matches no row,
/// so the result is empty. The returned table holds `columns` followed by
/// the threshold features.
pub fn find_outliers<S: AsRef<str>>(
    table: &ObservationTable,
    thresholds: &FeatureThresholds,
    columns: &[S],
) -> Result<OutlierSet, QcError> {
    if thresholds.is_empty() {
        return Err(QcError::EmptyThresholds);
    }

    let mut flagged = vec![true; table.num_rows()];
    for (feature, condition) in thresholds.conditions() {
        apply_condition(table, feature, &|z| condition.is_violated_by(z), &mut flagged)?;
    }

    collect(table, flagged, thresholds.features(), columns)
}

/// Find the rows whose absolute score on `feature` exceeds `multiplier`
pub fn detect_two_sided<S: AsRef<str>>(
    table: &ObservationTable,
    feature: &str,
    multiplier: f64,
    columns: &[S],
) -> Result<OutlierSet, QcError> {
    if multiplier <= 0.0 || !multiplier.is_finite() {
        return Err(QcError::InvalidMultiplier {
            feature: feature.to_string(),
            multiplier,
        });
    }

    let mut flagged = vec![true; table.num_rows()];
    let upper = TailCondition::Above(multiplier);
    let lower = TailCondition::Below(-multiplier);
    apply_condition(
        table,
        feature,
        &|z| upper.is_violated_by(z) || lower.is_violated_by(z),
        &mut flagged,
    )?;

    collect(table, flagged, std::iter::once(feature), columns)
}

fn apply_condition(
    table: &ObservationTable,
    feature: &str,
    violated: &dyn Fn(f64) -> bool,
    flagged: &mut [bool],
) -> Result<(), QcError> {
    let values = table.float_column(feature)?;

    let moments = match Moments::from_values(&values, Deviation::Population) {
        Some(m) if m.std_dev > 0.0 => m,
        _ => {
            warn!(
                "Feature {} has no spread across {} rows; it flags no rows",
                feature,
                table.num_rows()
            );
            flagged.fill(false);
            return Ok(());
        }
    };
    debug!(
        "{}: mean {:.4}, std {:.4} over {} values",
        feature, moments.mean, moments.std_dev, moments.count
    );

    for (i, keep) in flagged.iter_mut().enumerate() {
        *keep = *keep
            && values.is_valid(i)
            && moments.z_score(values.value(i)).is_some_and(violated);
    }
    Ok(())
}

fn collect<'a, S: AsRef<str>>(
    table: &ObservationTable,
    flagged: Vec<bool>,
    features: impl Iterator<Item = &'a str>,
    columns: &'a [S],
) -> Result<OutlierSet, QcError> {
    let mut selected: Vec<String> = Vec::with_capacity(columns.len() + 2);
    for name in columns.iter().map(|c| c.as_ref()).chain(features) {
        if !selected.iter().any(|s| s == name) {
            selected.push(name.to_string());
        }
    }

    let mask = BooleanArray::from(flagged);
    let outliers = table.filter(&mask)?.select(&selected)?;
    debug!("Flagged {} of {} rows", outliers.num_rows(), table.num_rows());
    Ok(OutlierSet::from_table(outliers))
}
