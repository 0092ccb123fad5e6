//! # Run and Profile Manifests
//!
//! Typed records describing what each plate needs:
//!
//! - [`PlateRun`]: the inputs of one image-processing engine run
//! - [`BarcodePlatemap`]: the barcode to platemap lookup shipped with a screen
//! - [`ProfileManifest`]: per plate, the cleaned profile, its platemap and its
//!   time point, as consumed by the downstream profiling step

mod error;


pub use error::ManifestError;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::qc::CLEANED_SUFFIX;

/// Where an engine run takes its images from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunInput {
    /// A LoadData CSV listing image paths per image set
    LoadData(PathBuf),
    /// A directory of images
    Images(PathBuf),
}

impl RunInput {
    /// Path of the input
    pub fn path(&self) -> &Path {
        match self {
            RunInput::LoadData(path) | RunInput::Images(path) => path,
        }
    }
}

/// One engine run for one plate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateRun {
    /// Plate name, used for the run log file name
    pub plate: String,
    /// Engine pipeline file
    pub pipeline: PathBuf,
    /// Image source
    pub input: RunInput,
    /// Directory the engine writes into
    pub output_dir: PathBuf,
}

impl PlateRun {
    /// Run driven by a LoadData CSV
    pub fn with_loaddata(
        plate: impl Into<String>,
        pipeline: impl Into<PathBuf>,
        loaddata: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            plate: plate.into(),
            pipeline: pipeline.into(),
            input: RunInput::LoadData(loaddata.into()),
            output_dir: output_dir.into(),
        }
    }

    /// Run over a directory of images
    pub fn with_images(
        plate: impl Into<String>,
        pipeline: impl Into<PathBuf>,
        images: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            plate: plate.into(),
            pipeline: pipeline.into(),
            input: RunInput::Images(images.into()),
            output_dir: output_dir.into(),
        }
    }
}

/// One row of a barcode platemap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatemapEntry {
    /// Plate barcode
    pub barcode: String,
    /// Platemap file name, without the `.csv` extension
    pub platemap_file: String,
    /// Acquisition time point
    #[serde(default)]
    pub time_point: Option<String>,
}

/// Barcode to platemap lookup
#[derive(Debug, Clone, Default)]
pub struct BarcodePlatemap {
    entries: Vec<PlatemapEntry>,
}

impl BarcodePlatemap {
    /// Build from entries
    pub fn new(entries: Vec<PlatemapEntry>) -> Self {
        Self { entries }
    }

    /// Read a `barcode,platemap_file,time_point` CSV; extra columns are ignored
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let mut reader = csv::Reader::from_path(path)?;
        let entries = reader
            .deserialize()
            .collect::<Result<Vec<PlatemapEntry>, _>>()?;
        Ok(Self { entries })
    }

    /// First entry for `barcode`
    pub fn lookup(&self, barcode: &str) -> Option<&PlatemapEntry> {
        self.entries.iter().find(|e| e.barcode == barcode)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the profiling step needs for one plate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlateProfile {
    /// Cleaned single-cell profile
    pub profile_path: PathBuf,
    /// Platemap CSV
    pub platemap_path: PathBuf,
    /// Acquisition time point
    pub time_point: Option<String>,
}

/// Per-plate profile inputs, keyed by plate name
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProfileManifest {
    /// Plates in name order
    pub plates: BTreeMap<String, PlateProfile>,
}

impl ProfileManifest {
    /// Match every cleaned profile in `cleaned_dir` with its platemap
    ///
    /// The plate name is the part of the file name before the first `_`.
    /// Platemaps are searched recursively under `platemap_dir`. Plates with
    /// no barcode entry or no platemap file are skipped with a warning.
    pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(
        cleaned_dir: P,
        platemap_dir: Q,
        barcodes: &BarcodePlatemap,
    ) -> Result<Self, ManifestError> {
        let cleaned_dir = cleaned_dir.as_ref();
        let platemap_dir = platemap_dir.as_ref();
        for dir in [cleaned_dir, platemap_dir] {
            if !dir.is_dir() {
                return Err(ManifestError::DirectoryNotFound(dir.to_path_buf()));
            }
        }

        let mut manifest = Self::default();
        for entry in fs::read_dir(cleaned_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(CLEANED_SUFFIX) {
                continue;
            }
            let plate = name.split('_').next().unwrap_or(name).to_string();

            let Some(entry) = barcodes.lookup(&plate) else {
                warn!("{}: no entry in barcode platemap, skipped", plate);
                continue;
            };
            let file_name = format!("{}.csv", entry.platemap_file);
            let Some(platemap_path) = find_file(platemap_dir, &file_name)? else {
                warn!("{}: platemap {} not found, skipped", plate, file_name);
                continue;
            };

            debug!("{}: {} with {}", plate, path.display(), platemap_path.display());
            manifest.plates.insert(
                plate,
                PlateProfile {
                    profile_path: path.canonicalize()?,
                    platemap_path: platemap_path.canonicalize()?,
                    time_point: entry.time_point.clone(),
                },
            );
        }
        Ok(manifest)
    }

    /// Number of plates
    pub fn len(&self) -> usize {
        self.plates.len()
    }

    /// Returns true if no plate was matched
    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }
}

/// First file named `file_name` under `dir`, searching depth first in name order
fn find_file(dir: &Path, file_name: &str) -> Result<Option<PathBuf>, ManifestError> {
    let mut entries = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if let Some(found) = find_file(&path, file_name)? {
                return Ok(Some(found));
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
