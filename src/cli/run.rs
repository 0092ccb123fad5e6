use anyhow::{Context, Result};
use plateqc::dispatch::EngineRunner;
use plateqc::manifest::PlateRun;
use plateqc::reconcile::PlateIdPattern;
use std::path::{Path, PathBuf};

use super::Config;

/// Run the engine once per input, all plates at the same time
pub fn run(
    config: &Config,
    inputs: Vec<PathBuf>,
    pipeline: PathBuf,
    output_root: PathBuf,
    images: bool,
    run_name: Option<String>,
) -> Result<()> {
    let settings = &config.dispatch;
    let pattern = PlateIdPattern::default();

    let runs: Vec<PlateRun> = inputs
        .into_iter()
        .map(|input| {
            let plate = plate_name(&input, &pattern);
            let output_dir = output_root.join(&plate);
            if images {
                PlateRun::with_images(plate, &pipeline, input, output_dir)
            } else {
                PlateRun::with_loaddata(plate, &pipeline, input, output_dir)
            }
        })
        .collect();

    let run_name = run_name
        .or_else(|| settings.run_name.clone())
        .unwrap_or_else(|| "analysis".to_string());
    let log_dir = settings.log_dir.clone().unwrap_or_else(|| PathBuf::from("logs"));

    let mut runner = EngineRunner::new(&log_dir, run_name);
    if let Some(engine) = &settings.engine {
        runner = runner.with_program(engine.clone());
    }
    if let Some(max_workers) = settings.max_workers {
        runner = runner.with_max_workers(max_workers);
    }

    let summary = runner
        .run_parallel(&runs)
        .context("Engine batch could not start")?;

    println!(
        "{} of {} run(s) succeeded; logs in {}",
        summary.success_count(),
        summary.results.len(),
        log_dir.display()
    );
    for failed in summary.failures() {
        match &failed.error {
            Some(err) => println!("  {} failed: {}", failed.plate, err),
            None => println!("  {} failed, see {}", failed.plate, failed.log_path.display()),
        }
    }
    Ok(())
}

/// Plate identifier from a LoadData file name, or the file stem otherwise
fn plate_name(input: &Path, pattern: &PlateIdPattern) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    pattern.plate_id(&stem).unwrap_or(stem)
}
