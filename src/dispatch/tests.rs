use super::*;
use crate::manifest::PlateRun;
use crate::reconcile::FolderNaming;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn os(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

fn pipeline(dir: &Path) -> PathBuf {
    let path = dir.join("analysis.cppipe");
    fs::write(&path, "CellProfiler Pipeline").unwrap();
    path
}

#[test]
fn test_engine_arguments() {
    let run = PlateRun::with_loaddata("BR00001", "a.cppipe", "BR00001.csv", "out/BR00001");
    assert_eq!(
        EngineRunner::arguments(&run),
        os(&["-c", "-r", "-p", "a.cppipe", "-o", "out/BR00001", "--data-file", "BR00001.csv"])
    );

    let run = PlateRun::with_images("BR00001", "a.cppipe", "images", "out");
    assert_eq!(
        EngineRunner::arguments(&run),
        os(&["-c", "-r", "-p", "a.cppipe", "-o", "out", "-i", "images"])
    );
}

#[test]
fn test_missing_pipeline_fails_before_launch() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("out");
    let runs = vec![PlateRun::with_loaddata(
        "BR00001",
        dir.path().join("missing.cppipe"),
        "BR00001.csv",
        &output,
    )];

    let err = EngineRunner::new(dir.path().join("logs"), "qc")
        .run_parallel(&runs)
        .unwrap_err();
    assert!(matches!(err, DispatchError::MissingPath(p) if p.ends_with("missing.cppipe")));
    assert!(!output.exists());
}

#[test]
fn test_missing_image_directory_fails() {
    let dir = tempdir().unwrap();
    let runs = vec![PlateRun::with_images(
        "BR00001",
        pipeline(dir.path()),
        dir.path().join("no_images"),
        dir.path().join("out"),
    )];

    let err = EngineRunner::new(dir.path(), "qc").validate(&runs).unwrap_err();
    assert!(matches!(err, DispatchError::MissingPath(_)));
}

#[test]
fn test_oversized_batch_rejected() {
    let dir = tempdir().unwrap();
    let pipeline = pipeline(dir.path());
    let runs: Vec<PlateRun> = ["BR00001", "BR00002", "BR00003"]
        .iter()
        .map(|plate| PlateRun::with_loaddata(*plate, &pipeline, "x.csv", dir.path().join(plate)))
        .collect();

    let err = EngineRunner::new(dir.path().join("logs"), "qc")
        .with_max_workers(2)
        .validate(&runs)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::TooManyWorkers {
            requested: 3,
            available: 2
        }
    ));
    assert!(!dir.path().join("BR00001").exists());
    assert!(!dir.path().join("logs").exists());
}

#[cfg(unix)]
#[test]
fn test_run_parallel_writes_plate_logs() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let pipeline = pipeline(dir.path());
    let logs = dir.path().join("logs");
    let runs = vec![
        PlateRun::with_loaddata("BR00001", &pipeline, "a.csv", dir.path().join("out/BR00001")),
        PlateRun::with_loaddata("BR00002", &pipeline, "b.csv", dir.path().join("out/BR00002")),
    ];

    let summary = EngineRunner::new(&logs, "whole_image")
        .with_program("true")
        .with_max_workers(2)
        .run_parallel(&runs)?;

    assert_eq!(summary.success_count(), 2);
    let plates: Vec<&str> = summary.results.iter().map(|r| r.plate.as_str()).collect();
    assert_eq!(plates, vec!["BR00001", "BR00002"]);
    assert!(dir.path().join("out/BR00002").is_dir());

    let log = fs::read_to_string(logs.join("BR00001_whole_image_run.log"))?;
    let first = log.lines().next().unwrap();
    assert!(first.starts_with('['));
    assert!(first.contains(&format!("] [Process ID: {}] Plate Name: BR00001", summary.results[0].pid)));
    assert!(log.contains("Output String: "));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_failed_run_is_reported_not_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let runs = vec![PlateRun::with_loaddata(
        "BR00001",
        pipeline(dir.path()),
        "a.csv",
        dir.path().join("out"),
    )];

    let summary = EngineRunner::new(dir.path().join("logs"), "qc")
        .with_program("false")
        .with_max_workers(1)
        .run_parallel(&runs)?;

    assert_eq!(summary.success_count(), 0);
    let failed: Vec<&RunResult> = summary.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, Some(1));
    assert!(failed[0].log_path.exists());
    Ok(())
}

#[test]
fn test_missing_engine_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let runs = vec![PlateRun::with_loaddata(
        "BR00001",
        pipeline(dir.path()),
        "a.csv",
        dir.path().join("out"),
    )];

    let summary = EngineRunner::new(dir.path().join("logs"), "qc")
        .with_program("plateqc-no-such-engine")
        .with_max_workers(1)
        .run_parallel(&runs)?;

    assert_eq!(summary.results[0].status, None);
    assert!(summary.results[0].error.is_some());
    let log = fs::read_to_string(&summary.results[0].log_path)?;
    assert!(log.contains("Failed to start plateqc-no-such-engine"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_unwritable_log_fails_only_that_plate() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let pipeline = pipeline(dir.path());
    // The log of the second plate lands in a directory that does not exist
    let runs = vec![
        PlateRun::with_loaddata("BR00001", &pipeline, "a.csv", dir.path().join("out/1")),
        PlateRun::with_loaddata("nowhere/BR00002", &pipeline, "b.csv", dir.path().join("out/2")),
    ];

    let summary = EngineRunner::new(dir.path().join("logs"), "qc")
        .with_program("true")
        .with_max_workers(2)
        .run_parallel(&runs)?;

    assert_eq!(summary.results.len(), 2);
    assert!(summary.results[0].succeeded());
    assert!(summary.results[0].log_path.exists());

    let failed: Vec<&RunResult> = summary.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].plate, "nowhere/BR00002");
    assert_eq!(failed[0].status, Some(0));
    assert!(failed[0]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("run log not written")));
    Ok(())
}

#[test]
fn test_plate_log_appends_lines() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = PlateLog::path_for(dir.path(), "BR00001", "illum");
    assert!(path.ends_with("BR00001_illum_run.log"));

    let mut log = PlateLog::create(&path, 4242)?;
    log.log("first")?;
    log.log("second")?;
    log.finish()?;

    let text = fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("] [Process ID: 4242] first"));
    // [YYYY-MM-DD HH:MM:SS,mmm]
    assert_eq!(lines[1].find(']'), Some(24));
    Ok(())
}

#[test]
fn test_loaddata_arguments() {
    let job = LoadDataJob {
        plate: "BR00001".to_string(),
        index_directory: "export/BR00001/Images".into(),
        config: "config.yml".into(),
        output: "BR00001_loaddata_original.csv".into(),
        illum: Some(IllumOptions {
            illum_directory: "illum/BR00001".into(),
            plate_id: "BR00001".to_string(),
            illum_output: "BR00001_loaddata_with_illum.csv".into(),
        }),
    };
    assert_eq!(
        LoadDataGenerator::arguments(&job),
        os(&[
            "--index-directory",
            "export/BR00001/Images",
            "config.yml",
            "BR00001_loaddata_original.csv",
            "--illum",
            "--illum-directory",
            "illum/BR00001",
            "--plate-id",
            "BR00001",
            "--illum-output",
            "BR00001_loaddata_with_illum.csv",
        ])
    );
}

#[test]
fn test_loaddata_plan_follows_folder_layouts() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempdir()?;
    let export = root.path().join("export");
    let configs = root.path().join("configs");
    fs::create_dir_all(export.join("BR00001_2024-01-01T10/Images"))?;
    fs::create_dir_all(export.join("2024_01_17_Re-imaged/BR00002__2024-01-17/Images"))?;
    fs::create_dir_all(export.join("2024_02_01_Extra/BR00003__2024-02-01/Images"))?;
    fs::create_dir_all(export.join("misc/Images"))?;
    fs::create_dir_all(&configs)?;
    fs::write(configs.join("config.yml"), "")?;
    fs::write(configs.join("17_Re-imaged.yml"), "")?;

    let planner = LoadDataPlanner {
        naming: FolderNaming::default(),
        config_dir: configs.clone(),
        output_dir: root.path().join("csvs"),
        illum_root: Some(root.path().join("illum")),
    };
    let jobs = planner.plan(&export)?;

    let plates: Vec<&str> = jobs.iter().map(|j| j.plate.as_str()).collect();
    assert_eq!(plates, vec!["17_Re-imaged_BR00002", "BR00001"]);
    assert_eq!(jobs[0].config, configs.join("17_Re-imaged.yml"));
    assert_eq!(jobs[1].config, configs.join("config.yml"));

    let illum = jobs[0].illum.as_ref().unwrap();
    assert_eq!(illum.plate_id, "BR00002");
    assert_eq!(illum.illum_directory, root.path().join("illum/BR00002"));
    assert!(illum
        .illum_output
        .ends_with("17_Re-imaged_BR00002_loaddata_with_illum.csv"));
    assert!(jobs[1].output.ends_with("BR00001_loaddata_original.csv"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_generate_with_illum_removes_plain_csv() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let plain = dir.path().join("BR00001_loaddata_original.csv");
    fs::write(&plain, "Metadata_Well\n")?;
    let job = LoadDataJob {
        plate: "BR00001".to_string(),
        index_directory: dir.path().to_path_buf(),
        config: "config.yml".into(),
        output: plain.clone(),
        illum: Some(IllumOptions {
            illum_directory: dir.path().to_path_buf(),
            plate_id: "BR00001".to_string(),
            illum_output: dir.path().join("BR00001_loaddata_with_illum.csv"),
        }),
    };

    let produced = LoadDataGenerator::with_program("true").generate(&job)?;
    assert!(produced.ends_with("BR00001_loaddata_with_illum.csv"));
    assert!(!plain.exists());

    let err = LoadDataGenerator::with_program("false").generate(&job).unwrap_err();
    assert!(matches!(err, DispatchError::LoadDataFailed { .. }));
    Ok(())
}
