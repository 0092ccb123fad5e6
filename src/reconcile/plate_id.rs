//! Plate identifiers embedded in file and folder names.

use std::path::Path;

use regex::Regex;

use super::ReconcileError;

/// Default pattern: barcode `BR00` followed by digits
pub const DEFAULT_PLATE_PATTERN: &str = r"(BR00\d+)";
/// Default marker of a re-imaged table in its file name
pub const DEFAULT_REIMAGED_MARKER: &str = "Re-imaged";

/// Extracts plate identifiers and the re-imaged flag from file names
#[derive(Debug, Clone)]
pub struct PlateIdPattern {
    regex: Regex,
    reimaged_marker: String,
}

impl PlateIdPattern {
    /// Compile a pattern; its first capture group (or the whole match when
    /// there is none) is the plate identifier
    pub fn new(pattern: &str, reimaged_marker: &str) -> Result<Self, ReconcileError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            reimaged_marker: reimaged_marker.to_string(),
        })
    }

    /// Plate identifier found in `name`, if any
    pub fn plate_id(&self, name: &str) -> Option<String> {
        let captures = self.regex.captures(name)?;
        captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().to_string())
    }

    /// Returns true if `name` marks a repeat acquisition
    pub fn is_reimaged(&self, name: &str) -> bool {
        name.contains(&self.reimaged_marker)
    }
}

impl Default for PlateIdPattern {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_PLATE_PATTERN).expect("default plate pattern is valid"),
            reimaged_marker: DEFAULT_REIMAGED_MARKER.to_string(),
        }
    }
}

/// Sort key ordering plates by the number after their alphabetic prefix
///
/// `BR00143976` sorts as 143976. Identifiers without digits sort last, by name.
pub fn numeric_key(plate_id: &str) -> (bool, u64, String) {
    let digits: String = plate_id
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u64>() {
        Ok(n) => (false, n, plate_id.to_string()),
        Err(_) => (true, 0, plate_id.to_string()),
    }
}

/// Folder layouts of the acquisition export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNaming {
    /// First component starts with the plate barcode (`BR00...`)
    pub barcode_prefix: String,
    /// First component starts with an acquisition date (`2024...`)
    pub dated_prefix: String,
}

impl Default for FolderNaming {
    fn default() -> Self {
        Self {
            barcode_prefix: "BR00".to_string(),
            dated_prefix: "2024".to_string(),
        }
    }
}

impl FolderNaming {
    /// Plate name for an `Images` folder, given its path relative to the
    /// export root
    ///
    /// - `BR00143976_2024-01-01/Images` gives `BR00143976`
    /// - `2024_01_17_Re-imaged/BR00143976_x/Images` gives
    ///   `17_Re-imaged_BR00143976`
    ///
    /// Other layouts give `None`.
    pub fn plate_name(&self, relative: &Path) -> Option<String> {
        let mut parts = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str());
        let first = parts.next()?;

        if first.starts_with(&self.barcode_prefix) {
            return first.split('_').next().map(str::to_string);
        }

        if first.starts_with(&self.dated_prefix) {
            let second = parts.next()?;
            let pieces: Vec<&str> = first.split('_').collect();
            let tail = pieces[pieces.len().saturating_sub(2)..].join("_");
            let head = second.split('_').next()?;
            return Some(format!("{}_{}", tail, head));
        }

        None
    }
}
