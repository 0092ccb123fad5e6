use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::plate_id::{numeric_key, PlateIdPattern};

/// One input file assigned to a plate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Path of the CSV
    pub path: PathBuf,
    /// File name carries the re-imaged marker
    pub reimaged: bool,
}

/// Input files grouped by plate identifier
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    /// Plates in numeric order, each with its files in file-name order
    pub groups: Vec<(String, Vec<PlannedFile>)>,
    /// Files whose name matched no plate identifier
    pub unused: Vec<PathBuf>,
}

impl BatchPlan {
    /// Files of `plate_id`, empty if the plate is unknown
    pub fn files(&self, plate_id: &str) -> &[PlannedFile] {
        self.groups
            .iter()
            .find(|(id, _)| id == plate_id)
            .map(|(_, files)| files.as_slice())
            .unwrap_or(&[])
    }

    /// All files assigned to some plate
    pub fn used(&self) -> impl Iterator<Item = &PlannedFile> {
        self.groups.iter().flat_map(|(_, files)| files.iter())
    }
}

/// Group `files` by the plate identifier in their file stem
///
/// Plates listed in `expected` are always present in the plan, possibly
/// with no files.
pub fn plan_batch(files: &[PathBuf], pattern: &PlateIdPattern, expected: &[String]) -> BatchPlan {
    let mut sorted: Vec<&PathBuf> = files.iter().collect();
    sorted.sort_by_key(|path| file_name(path));

    let mut groups: BTreeMap<(bool, u64, String), Vec<PlannedFile>> = expected
        .iter()
        .map(|id| (numeric_key(id), Vec::new()))
        .collect();
    let mut unused = Vec::new();

    for path in sorted {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match pattern.plate_id(stem) {
            Some(id) => groups.entry(numeric_key(&id)).or_default().push(PlannedFile {
                path: path.clone(),
                reimaged: pattern.is_reimaged(stem),
            }),
            None => unused.push(path.clone()),
        }
    }

    BatchPlan {
        groups: groups
            .into_iter()
            .map(|((_, _, id), files)| (id, files))
            .collect(),
        unused,
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
