use super::*;
use crate::table::ObservationTable;
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::tempdir;

fn feature_table(columns: &[(&str, Vec<f64>)]) -> ObservationTable {
    let rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
    let mut fields = vec![Field::new("Metadata_Well", DataType::Utf8, true)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        (0..rows).map(|i| format!("W{:02}", i)).collect::<Vec<_>>(),
    ))];
    for (name, values) in columns {
        fields.push(Field::new(*name, DataType::Float64, true));
        arrays.push(Arc::new(Float64Array::from(values.clone())));
    }
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap();
    ObservationTable::new(batch)
}

fn ids(set: &OutlierSet) -> Vec<usize> {
    set.row_ids().iter().copied().collect()
}

const METRIC: [f64; 6] = [-5.0, -1.0, 0.0, 1.0, 2.0, 100.0];

#[test]
fn test_single_extreme_value_flagged_upper_tail() {
    let table = feature_table(&[("metric", METRIC.to_vec())]);
    let spec = FeatureThresholds::new().with("metric", 2.0).unwrap();

    let outliers = find_outliers(&table, &spec, &["Metadata_Well"]).unwrap();
    assert_eq!(ids(&outliers), vec![5]);
    assert_eq!(
        outliers.table().column_names(),
        vec!["Metadata_Well".to_string(), "metric".to_string()]
    );
}

#[test]
fn test_two_sided_scenario() {
    let table = feature_table(&[("metric", METRIC.to_vec())]);

    let outliers = detect_two_sided(&table, "metric", 2.0, &[] as &[&str]).unwrap();
    assert_eq!(ids(&outliers), vec![5]);

    // Nothing falls below mean - 2 * std
    let below = find_outliers(
        &table,
        &FeatureThresholds::new().with("metric", -2.0).unwrap(),
        &[] as &[&str],
    )
    .unwrap();
    assert!(below.is_empty());
}

#[test]
fn test_negative_multiplier_flags_lower_tail() {
    let values = vec![0.95, 0.96, 0.94, 0.95, 0.97, 0.96, 0.95, 0.5];
    let table = feature_table(&[("Nuclei_AreaShape_Solidity", values)]);
    let spec = FeatureThresholds::new()
        .with("Nuclei_AreaShape_Solidity", -2.0)
        .unwrap();

    let outliers = find_outliers(&table, &spec, &["Metadata_Well"]).unwrap();
    assert_eq!(ids(&outliers), vec![7]);
}

#[test]
fn test_features_are_and_combined() {
    // Row 5 is extreme in both features, row 4 only in area
    let area = vec![1.0, 1.1, 0.9, 1.0, 50.0, 50.0];
    let intensity = vec![1.0, 1.0, 1.0, 1.0, 1.0, 60.0];
    let table = feature_table(&[("area", area), ("intensity", intensity)]);

    let both = FeatureThresholds::new()
        .with("area", 1.0)
        .unwrap()
        .with("intensity", 1.0)
        .unwrap();
    let outliers = find_outliers(&table, &both, &[] as &[&str]).unwrap();
    assert_eq!(ids(&outliers), vec![5]);
}

#[test]
fn test_zero_spread_flags_nothing() {
    let table = feature_table(&[("flat", vec![3.0; 5]), ("other", vec![1.0, 2.0, 3.0, 4.0, 100.0])]);

    let spec = FeatureThresholds::new().with("flat", 1.0).unwrap();
    assert!(find_outliers(&table, &spec, &[] as &[&str]).unwrap().is_empty());

    // A degenerate feature empties the AND even if the other one matches
    let spec = spec.with("other", 1.0).unwrap();
    assert!(find_outliers(&table, &spec, &[] as &[&str]).unwrap().is_empty());
}

#[test]
fn test_missing_feature_is_an_error() {
    let table = feature_table(&[("metric", METRIC.to_vec())]);
    let spec = FeatureThresholds::new().with("absent", 2.0).unwrap();
    assert!(matches!(
        find_outliers(&table, &spec, &[] as &[&str]),
        Err(QcError::TableError(_))
    ));
    assert!(matches!(
        find_outliers(&table, &FeatureThresholds::new(), &[] as &[&str]),
        Err(QcError::EmptyThresholds)
    ));
}

#[test]
fn test_detection_leaves_input_untouched() {
    let table = feature_table(&[("metric", METRIC.to_vec())]);
    let before = table.batch().clone();
    let spec = FeatureThresholds::new().with("metric", 2.0).unwrap();
    let _ = find_outliers(&table, &spec, &["Metadata_Well"]).unwrap();
    assert_eq!(table.batch(), &before);
}

#[test]
fn test_calibrator_two_sided_and_upper_only() {
    let table = feature_table(&[("metric", METRIC.to_vec())]);

    let two_sided = calibrate(&table, "metric", 2.0, ThresholdPolicy::TwoSided).unwrap();
    assert!((two_sided.mean - 16.1667).abs() < 1e-3);
    assert!((two_sided.upper - (two_sided.mean + 2.0 * two_sided.std_dev)).abs() < 1e-12);
    assert!(two_sided.lower.is_some());

    let upper_only = calibrate(&table, "metric", 2.0, ThresholdPolicy::UpperOnly).unwrap();
    assert_eq!(upper_only.lower, None);
    assert_eq!(upper_only.upper, two_sided.upper);
}

#[test]
fn test_calibrator_is_deterministic() {
    let table = feature_table(&[("metric", METRIC.to_vec())]);
    let first = calibrate(&table, "metric", 2.5, ThresholdPolicy::TwoSided).unwrap();
    for _ in 0..5 {
        let again = calibrate(&table, "metric", 2.5, ThresholdPolicy::TwoSided).unwrap();
        assert_eq!(again.upper.to_bits(), first.upper.to_bits());
        assert_eq!(again.lower.map(f64::to_bits), first.lower.map(f64::to_bits));
    }
}

#[test]
fn test_calibrator_rounding_and_errors() {
    let table = feature_table(&[("metric", vec![1.0, 2.0, 3.0, 4.0])]);
    let cutoffs = calibrate(&table, "metric", 2.0, ThresholdPolicy::TwoSided)
        .unwrap()
        .rounded(2);
    // mean 2.5, sample std 1.2910
    assert_eq!(cutoffs.upper, 5.08);
    assert_eq!(cutoffs.lower, Some(-0.08));

    assert!(matches!(
        calibrate(&table, "metric", -1.0, ThresholdPolicy::TwoSided),
        Err(QcError::InvalidMultiplier { .. })
    ));

    let single = feature_table(&[("metric", vec![1.0])]);
    assert!(matches!(
        calibrate(&single, "metric", 2.0, ThresholdPolicy::UpperOnly),
        Err(QcError::InsufficientData { count: 1, .. })
    ));
}

#[test]
fn test_cleaning_removes_union_of_outlier_sets() -> Result<(), Box<dyn std::error::Error>> {
    // Set A flags rows {0, 1, 2}, set B flags rows {2, 3}
    let a: Vec<f64> = (0..10).map(|i| if i < 3 { 100.0 } else { 0.0 }).collect();
    let b: Vec<f64> = (0..10).map(|i| if i == 2 || i == 3 { 100.0 } else { 0.0 }).collect();
    let table = feature_table(&[("a", a), ("b", b)]);

    let set_a = find_outliers(&table, &FeatureThresholds::new().with("a", 1.0)?, &["Metadata_Well"])?;
    let set_b = find_outliers(&table, &FeatureThresholds::new().with("b", 1.0)?, &["Metadata_Well"])?;
    assert_eq!(set_a.len(), 3);
    assert_eq!(set_b.len(), 2);

    let dir = tempdir()?;
    let writer = CleanedProfileWriter::new(dir.path())?;
    let stats = writer.write("BR00000001", &table, &[&set_a, &set_b])?;

    assert_eq!(stats.rows_removed, 4);
    assert_eq!(stats.rows_after, 6);
    assert!((stats.percent_removed - 40.0).abs() < 1e-9);

    let path = dir.path().join("BR00000001_cleaned.parquet");
    assert_eq!(stats.output_path.as_deref(), Some(path.as_path()));
    let persisted = ObservationTable::open(&path)?;
    assert_eq!(persisted.num_rows(), 6);
    Ok(())
}

#[test]
fn test_stack_channels_and_removal_summary() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Metadata_Well", DataType::Utf8, true),
        Field::new("Metadata_Site", DataType::Int64, true),
        Field::new("ImageQuality_PercentMaximal_OrigDNA", DataType::Float64, true),
        Field::new("ImageQuality_PercentMaximal_OrigER", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["A01", "A01", "A02", "A02"])),
            Arc::new(Int64Array::from(vec![1, 2, 1, 2])),
            Arc::new(Float64Array::from(vec![0.1, 0.1, 0.1, 0.1])),
            Arc::new(Float64Array::from(vec![0.1, 0.1, 0.1, 9.0])),
        ],
    )
    .unwrap();
    let wide = ObservationTable::new(batch);

    let stacked = image::stack_plates(
        &[("BR00000001".to_string(), wide.clone()), ("BR00000002".to_string(), wide)],
        &["OrigDNA".to_string(), "OrigER".to_string()],
        &["ImageQuality_PercentMaximal".to_string()],
    )
    .unwrap();
    assert_eq!(stacked.num_rows(), 16);
    assert!(stacked.has_column("Channel"));
    assert!(stacked.has_column("Metadata_Plate"));

    let outliers =
        detect_two_sided(&stacked, "ImageQuality_PercentMaximal", 2.0, &["Metadata_Plate"]).unwrap();
    assert_eq!(outliers.len(), 2);

    let summary = image::removal_summary(&stacked, &outliers).unwrap();
    assert_eq!(summary.total_combinations, 8);
    assert_eq!(summary.removed_combinations, 2);
    assert!((summary.percent_removed - 25.0).abs() < 1e-9);
    assert_eq!(summary.per_channel.get("OrigER"), Some(&2));
}

proptest! {
    /// Two-feature results are the intersection of the single-feature results
    #[test]
    fn prop_and_is_intersection(
        rows in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 3..60),
        m1 in prop_oneof![0.25f64..2.5, -2.5f64..-0.25],
        m2 in prop_oneof![0.25f64..2.5, -2.5f64..-0.25],
    ) {
        let (x, y): (Vec<f64>, Vec<f64>) = rows.into_iter().unzip();
        let table = feature_table(&[("x", x), ("y", y)]);
        let none: &[&str] = &[];

        let only_x = find_outliers(&table, &FeatureThresholds::new().with("x", m1).unwrap(), none).unwrap();
        let only_y = find_outliers(&table, &FeatureThresholds::new().with("y", m2).unwrap(), none).unwrap();
        let both = FeatureThresholds::new().with("x", m1).unwrap().with("y", m2).unwrap();
        let combined = find_outliers(&table, &both, none).unwrap();

        let expected: BTreeSet<usize> = only_x.row_ids().intersection(only_y.row_ids()).copied().collect();
        prop_assert_eq!(combined.row_ids(), &expected);
    }

    /// Single-feature results match a direct strict comparison of z-scores
    #[test]
    fn prop_single_feature_strict_tail(
        values in prop::collection::vec(-1000.0f64..1000.0, 2..80),
        m in prop_oneof![0.1f64..3.0, -3.0f64..-0.1],
    ) {
        let table = feature_table(&[("x", values.clone())]);
        let outliers = find_outliers(&table, &FeatureThresholds::new().with("x", m).unwrap(), &[] as &[&str]).unwrap();

        let moments = Moments::from_slice(&values, Deviation::Population).unwrap();
        let expected: BTreeSet<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| match moments.z_score(**v) {
                Some(z) if m > 0.0 => z > m,
                Some(z) => z < m,
                None => false,
            })
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(outliers.row_ids(), &expected);
    }

    /// Cleaning removes exactly the union of identities
    #[test]
    fn prop_cleaning_removes_union(
        n in 1usize..50,
        a in prop::collection::btree_set(0usize..50, 0..20),
        b in prop::collection::btree_set(0usize..50, 0..20),
    ) {
        let table = feature_table(&[("x", (0..n).map(|i| i as f64).collect())]);
        let union: BTreeSet<usize> = a.union(&b).copied().filter(|i| *i < n).collect();
        let cleaned = table.drop_rows(&union).unwrap();
        prop_assert_eq!(cleaned.num_rows(), n - union.len());
        prop_assert!(cleaned.row_ids().iter().all(|id| !union.contains(id)));
    }
}
