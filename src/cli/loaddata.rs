use anyhow::{Context, Result};
use log::error;
use plateqc::dispatch::{LoadDataGenerator, LoadDataPlanner};
use plateqc::reconcile::FolderNaming;
use std::path::PathBuf;

use super::Config;

/// Generate a LoadData CSV for every acquisition folder under `index_root`
pub fn run(
    config: &Config,
    index_root: PathBuf,
    config_dir: PathBuf,
    output_dir: PathBuf,
    illum_dir: Option<PathBuf>,
) -> Result<()> {
    let planner = LoadDataPlanner {
        naming: FolderNaming::default(),
        config_dir,
        output_dir,
        illum_root: illum_dir,
    };
    let jobs = planner
        .plan(&index_root)
        .with_context(|| format!("Failed to scan {}", index_root.display()))?;

    let generator = match &config.dispatch.generator {
        Some(program) => LoadDataGenerator::with_program(program.clone()),
        None => LoadDataGenerator::default(),
    };

    let mut failed = 0;
    for job in &jobs {
        match generator.generate(job) {
            Ok(path) => println!("{}: {}", job.plate, path.display()),
            Err(e) => {
                error!("{}: {}", job.plate, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} LoadData CSV(s) failed", failed, jobs.len());
    }
    Ok(())
}
