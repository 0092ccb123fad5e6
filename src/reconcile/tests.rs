use super::*;
use crate::table::ObservationTable;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn keys(table: &ObservationTable) -> Vec<(String, String)> {
    let wells = table.string_values("Metadata_Well").unwrap();
    let sites = table.string_values("Metadata_Site").unwrap();
    wells
        .into_iter()
        .zip(sites)
        .map(|(w, s)| (w.unwrap(), s.unwrap()))
        .collect()
}

const ORIGINAL: &str = "\
Metadata_Plate,Metadata_Well,Metadata_Site,FileName_OrigDNA
BR00001,A1,1,orig_a1_1.tiff
BR00001,A1,2,orig_a1_2.tiff
";

const REIMAGED: &str = "\
Metadata_Plate,Metadata_Well,Metadata_Site,FileName_OrigDNA
BR00001,A1,1,reimaged_a1_1.tiff
";

#[test]
fn test_reimaged_row_replaces_original() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_csv(dir.path(), "BR00001_loaddata_original.csv", ORIGINAL);
    write_csv(dir.path(), "2024_01_17_Re-imaged_BR00001_loaddata_original.csv", REIMAGED);

    let reconciler = Reconciler::new(dir.path(), ReconcileVariant::Original);
    let inputs = reconciler.discover(dir.path())?;
    let outcome = reconciler.run(&inputs)?;

    assert_eq!(outcome.outputs, vec![dir.path().join("BR00001_concatenated.csv")]);
    assert!(outcome.data_loss.is_clean());
    assert!(!outcome.report.has_failures());
    assert_eq!(outcome.report.written_count(), 1);
    let counts = outcome.report.checks[0].status.counts().copied().unwrap();
    assert_eq!((counts.rows_in, counts.rows_out, counts.superseded), (3, 2, 1));
    assert_eq!(counts.reimaged_rows, 1);

    let merged = ObservationTable::from_csv(&outcome.outputs[0])?;
    assert_eq!(
        keys(&merged),
        vec![
            ("A1".to_string(), "1".to_string()),
            ("A1".to_string(), "2".to_string())
        ]
    );
    assert_eq!(merged.flag_values(columns::REIMAGED)?, vec![true, false]);
    let files = merged.string_values("FileName_OrigDNA")?;
    assert_eq!(files[0].as_deref(), Some("reimaged_a1_1.tiff"));
    assert_eq!(files[1].as_deref(), Some("orig_a1_2.tiff"));
    Ok(())
}

#[test]
fn test_unused_files_block_source_removal() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_csv(dir.path(), "BR00001_loaddata_original.csv", ORIGINAL);
    let stray = write_csv(dir.path(), "plate_layout.csv", "a,b\n1,2\n");

    let reconciler = Reconciler::new(dir.path(), ReconcileVariant::Original);
    let outcome = reconciler.run(&reconciler.discover(dir.path())?)?;

    assert_eq!(outcome.data_loss.unused_files, vec![stray.clone()]);
    assert!(outcome.report.has_warnings());
    assert!(matches!(
        outcome.remove_sources(),
        Err(ReconcileError::UnusedInputs(1))
    ));
    assert!(stray.exists());
    assert!(dir.path().join("BR00001_loaddata_original.csv").exists());
    Ok(())
}

#[test]
fn test_remove_sources_keeps_outputs() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let original = write_csv(dir.path(), "BR00001_loaddata_original.csv", ORIGINAL);
    let reimaged = write_csv(dir.path(), "Re-imaged_BR00001_loaddata_original.csv", REIMAGED);

    let reconciler = Reconciler::new(dir.path(), ReconcileVariant::Original);
    let outcome = reconciler.run(&reconciler.discover(dir.path())?)?;
    assert_eq!(outcome.remove_sources()?, 2);

    assert!(!original.exists());
    assert!(!reimaged.exists());
    assert!(outcome.outputs[0].exists());

    // A second discovery only sees reconciled outputs, which it ignores
    assert!(reconciler.discover(dir.path())?.is_empty());
    Ok(())
}

#[test]
fn test_expected_plate_without_files_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_csv(dir.path(), "BR00001_loaddata_original.csv", ORIGINAL);

    let reconciler = Reconciler::new(dir.path(), ReconcileVariant::Original)
        .with_expected_plates(vec!["BR00002".to_string(), "BR00001".to_string()]);
    let outcome = reconciler.run(&reconciler.discover(dir.path())?)?;

    assert_eq!(outcome.outputs.len(), 1);
    let names: Vec<&str> = outcome.report.checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["BR00001", "BR00002"]);
    assert!(matches!(outcome.report.checks[1].status, CheckStatus::Skipped { .. }));
    assert!(!outcome.report.has_failures());
    Ok(())
}

#[test]
fn test_with_illum_reorders_columns_and_rows() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_csv(
        dir.path(),
        "BR00001_loaddata_with_illum.csv",
        "\
Metadata_Col,Metadata_Row,Metadata_Well,Metadata_Site,FileName_IllumDNA
2,A,A2,1,illum.npy
1,B,B1,1,illum.npy
1,A,A1,2,illum.npy
1,A,A1,1,illum.npy
",
    );
    write_csv(
        dir.path(),
        "Re-imaged_BR00001_loaddata_with_illum.csv",
        "\
Metadata_Site,Metadata_Well,FileName_IllumDNA,Metadata_Row,Metadata_Col,Extra
1,B1,illum_reimaged.npy,B,1,x
",
    );

    let reconciler = Reconciler::new(dir.path(), ReconcileVariant::WithIllum);
    let outcome = reconciler.run(&reconciler.discover(dir.path())?)?;
    assert_eq!(
        outcome.outputs,
        vec![dir.path().join("BR00001_concatenated_with_illum.csv")]
    );

    let merged = ObservationTable::from_csv(&outcome.outputs[0])?;
    assert_eq!(
        merged.column_names(),
        vec![
            "Metadata_Col",
            "Metadata_Row",
            "Metadata_Well",
            "Metadata_Site",
            "FileName_IllumDNA",
            "Metadata_Reimaged"
        ]
    );
    let wells: Vec<String> = keys(&merged).into_iter().map(|(w, s)| format!("{w}/{s}")).collect();
    assert_eq!(wells, vec!["A1/1", "A1/2", "B1/1", "A2/1"]);
    let illum = merged.string_values("FileName_IllumDNA")?;
    assert_eq!(illum[2].as_deref(), Some("illum_reimaged.npy"));
    Ok(())
}

#[test]
fn test_missing_reference_column_fails_only_that_plate() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write_csv(
        dir.path(),
        "BR00001_loaddata_with_illum.csv",
        "Metadata_Col,Metadata_Row,Metadata_Well,Metadata_Site\n1,A,A1,1\n",
    );
    write_csv(
        dir.path(),
        "BR00002_loaddata_with_illum.csv",
        "Metadata_Col,Metadata_Well,Metadata_Site\n1,A1,1\n",
    );

    let reconciler = Reconciler::new(dir.path(), ReconcileVariant::WithIllum);
    let outcome = reconciler.run(&reconciler.discover(dir.path())?)?;

    assert_eq!(outcome.outputs.len(), 1);
    assert_eq!(outcome.report.written_count(), 1);
    assert_eq!(outcome.report.failure_count(), 1);
    assert_eq!(outcome.report.checks[1].name, "BR00002");
    Ok(())
}

#[test]
fn test_failed_plate_keeps_its_sources() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let good = write_csv(
        dir.path(),
        "BR00001_loaddata_with_illum.csv",
        "Metadata_Col,Metadata_Row,Metadata_Well,Metadata_Site\n1,A,A1,1\n",
    );
    let broken = write_csv(
        dir.path(),
        "BR00002_loaddata_with_illum.csv",
        "Metadata_Col,Metadata_Well,Metadata_Site\n1,A1,1\n",
    );

    let reconciler = Reconciler::new(dir.path(), ReconcileVariant::WithIllum);
    let outcome = reconciler.run(&reconciler.discover(dir.path())?)?;
    assert!(outcome.report.has_failures());
    assert_eq!(outcome.reconciled_inputs, vec![good.clone()]);

    assert_eq!(outcome.remove_sources()?, 1);
    assert!(!good.exists());
    assert!(broken.exists());
    assert!(!reconciler.output_path("BR00002").exists());
    Ok(())
}

#[test]
fn test_plan_orders_plates_numerically() {
    let files: Vec<PathBuf> = [
        "BR00120_loaddata_original.csv",
        "BR0099_loaddata_original.csv",
        "BR00120_Re-imaged_loaddata_original.csv",
        "README.csv",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    let pattern = PlateIdPattern::new(r"(BR0+\d+)", "Re-imaged").unwrap();

    let plan = plan_batch(&files, &pattern, &[]);
    let ids: Vec<&str> = plan.groups.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["BR0099", "BR00120"]);
    assert_eq!(plan.unused, vec![PathBuf::from("README.csv")]);

    let files = plan.files("BR00120");
    assert_eq!(files.len(), 2);
    assert!(files[0].reimaged);
    assert!(!files[1].reimaged);
    assert!(plan.files("BR00999").is_empty());
}

#[test]
fn test_unaccounted_rows_detects_loss() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = write_csv(dir.path(), "BR00001_loaddata_original.csv", ORIGINAL);
    let sources = vec![SourceTable::load(path.clone(), false)?];

    let plate = reconcile_plate("BR00001", &sources, None, &[])?.unwrap();
    assert!(unaccounted_rows(&sources, &plate.table)?.is_empty());

    let truncated = plate.table.take(&[0])?;
    assert_eq!(unaccounted_rows(&sources, &truncated)?, vec![(path, 1)]);
    Ok(())
}

#[test]
fn test_reconcile_plate_without_sources() {
    assert!(reconcile_plate("BR00001", &[], None, &[]).unwrap().is_none());
}

#[test]
fn test_report_display() {
    let mut report = ReconcileReport::default();
    let counts = PlateCounts {
        files: 2,
        rows_in: 3,
        rows_out: 2,
        reimaged_rows: 1,
        superseded: 1,
        missing: 0,
    };
    report.add_check(ReconcileCheck::written("BR00001", counts));
    report.add_check(ReconcileCheck::skipped("BR00002", "no input files"));
    report.add_check(ReconcileCheck::written(
        "BR00003",
        PlateCounts {
            missing: 1,
            superseded: 0,
            ..counts
        },
    ));

    assert!(matches!(report.checks[0].status, CheckStatus::Reconciled(_)));
    assert!(matches!(report.checks[2].status, CheckStatus::RowsMissing(_)));
    assert_eq!(report.warning_count(), 2);
    assert_eq!(report.totals().rows_out, 4);

    let text = report.to_string();
    assert!(text.contains("2 file(s), 3 -> 2 rows (1 re-imaged, 1 superseded)"));
    assert!(text.contains("BR00002      skipped: no input files"));
    assert!(text.contains("3 -> 2 rows, 0 superseded, 1 missing"));
    assert!(text.contains("2 plate(s) written, 2 warning(s), 0 failed; 6 rows in, 4 out, 1 superseded"));
}
