use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{info, warn};

use super::DispatchError;
use crate::reconcile::FolderNaming;

/// LoadData CSV generator executable
pub const DEFAULT_GENERATOR: &str = "pe2loaddata";

/// Name of the acquisition folders holding the images and their index
pub const IMAGES_FOLDER: &str = "Images";

/// Illumination correction settings of a LoadData job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllumOptions {
    /// Directory of the plate's correction functions
    pub illum_directory: PathBuf,
    /// Plate barcode the functions were computed for
    pub plate_id: String,
    /// CSV written with the correction functions added
    pub illum_output: PathBuf,
}

/// One LoadData CSV to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDataJob {
    /// Plate name
    pub plate: String,
    /// Acquisition `Images` folder
    pub index_directory: PathBuf,
    /// Generator channel configuration
    pub config: PathBuf,
    /// Plain CSV output
    pub output: PathBuf,
    /// Also reference correction functions
    pub illum: Option<IllumOptions>,
}

/// Finds acquisition folders and turns them into LoadData jobs
#[derive(Debug, Clone)]
pub struct LoadDataPlanner {
    /// Folder naming of the export
    pub naming: FolderNaming,
    /// Directory of the generator configurations
    pub config_dir: PathBuf,
    /// Directory the CSVs are written to
    pub output_dir: PathBuf,
    /// Root of the per-plate correction function directories, if any
    pub illum_root: Option<PathBuf>,
}

impl LoadDataPlanner {
    /// Configuration used by barcode-named folders
    pub fn default_config(&self) -> PathBuf {
        self.config_dir.join("config.yml")
    }

    /// One job per `Images` folder under `index_root`, in path order
    ///
    /// Folders with an unrecognized layout, dated folders without a matching
    /// configuration, and plates without a barcode (when correction functions
    /// are requested) are skipped with a warning.
    pub fn plan(&self, index_root: &Path) -> Result<Vec<LoadDataJob>, DispatchError> {
        let mut folders = Vec::new();
        collect_images_folders(index_root, &mut folders)?;
        folders.sort();

        let mut jobs = Vec::new();
        for folder in folders {
            let relative = folder.strip_prefix(index_root).unwrap_or(&folder);
            let Some(plate) = self.naming.plate_name(relative) else {
                warn!("Unexpected folder pattern: {}", folder.display());
                continue;
            };
            let Some(config) = self.config_for(&plate)? else {
                warn!("No matching config file for dated plate: {}", plate);
                continue;
            };
            info!("Config path for plate '{}': {}", plate, config.display());

            let output = self.output_dir.join(format!("{}_loaddata_original.csv", plate));
            let illum = match &self.illum_root {
                None => None,
                Some(root) => {
                    let Some(plate_id) = plate
                        .split('_')
                        .find(|part| part.starts_with(&self.naming.barcode_prefix))
                    else {
                        warn!("No plate barcode in {}; skipped", plate);
                        continue;
                    };
                    Some(IllumOptions {
                        illum_directory: root.join(plate_id),
                        plate_id: plate_id.to_string(),
                        illum_output: self
                            .output_dir
                            .join(format!("{}_loaddata_with_illum.csv", plate)),
                    })
                }
            };

            jobs.push(LoadDataJob {
                plate,
                index_directory: folder,
                config,
                output,
                illum,
            });
        }
        Ok(jobs)
    }

    fn config_for(&self, plate: &str) -> Result<Option<PathBuf>, DispatchError> {
        if plate.starts_with(&self.naming.barcode_prefix) {
            return Ok(Some(self.default_config()));
        }
        let prefix = format!("{}_", plate.split('_').next().unwrap_or(plate));
        let mut matches: Vec<PathBuf> = fs::read_dir(&self.config_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".yml"))
            })
            .collect();
        matches.sort();
        Ok(matches.into_iter().next())
    }
}

fn collect_images_folders(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), DispatchError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some(IMAGES_FOLDER) {
            found.push(path.clone());
        }
        collect_images_folders(&path, found)?;
    }
    Ok(())
}

/// Invokes the LoadData CSV generator
#[derive(Debug, Clone)]
pub struct LoadDataGenerator {
    program: String,
}

impl Default for LoadDataGenerator {
    fn default() -> Self {
        Self {
            program: DEFAULT_GENERATOR.to_string(),
        }
    }
}

impl LoadDataGenerator {
    /// Use another generator executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for a job
    pub fn arguments(job: &LoadDataJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--index-directory".into(),
            job.index_directory.clone().into_os_string(),
            job.config.clone().into_os_string(),
            job.output.clone().into_os_string(),
        ];
        if let Some(illum) = &job.illum {
            args.extend([
                "--illum".into(),
                "--illum-directory".into(),
                illum.illum_directory.clone().into_os_string(),
                "--plate-id".into(),
                illum.plate_id.clone().into(),
                "--illum-output".into(),
                illum.illum_output.clone().into_os_string(),
            ]);
        }
        args
    }

    /// Generate one CSV and return the path the plate should use
    ///
    /// With correction functions, the plain CSV is removed afterwards and the
    /// correction-aware CSV is returned.
    pub fn generate(&self, job: &LoadDataJob) -> Result<PathBuf, DispatchError> {
        if let Some(parent) = job.output.parent() {
            fs::create_dir_all(parent)?;
        }
        let status = Command::new(&self.program)
            .args(Self::arguments(job))
            .status()
            .map_err(|source| DispatchError::SpawnFailed {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(DispatchError::LoadDataFailed {
                plate: job.plate.clone(),
                status: status.to_string(),
            });
        }

        match &job.illum {
            None => {
                info!("{} is created!", job.output.display());
                Ok(job.output.clone())
            }
            Some(illum) => {
                info!("{} is created!", illum.illum_output.display());
                if job.output.exists() {
                    fs::remove_file(&job.output)?;
                    info!(
                        "Removed {}: it does not reference the correction functions",
                        job.output.display()
                    );
                }
                Ok(illum.illum_output.clone())
            }
        }
    }
}
