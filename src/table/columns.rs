//! Column names shared by the engine's measurement tables and LoadData CSVs.

/// Prefix of metadata columns in image-level tables
pub const METADATA_PREFIX: &str = "Metadata_";
/// Prefix of image metadata columns carried into single-cell tables
pub const IMAGE_METADATA_PREFIX: &str = "Image_Metadata_";

/// Plate identifier
pub const PLATE: &str = "Metadata_Plate";
/// Well identifier (e.g. `B02`)
pub const WELL: &str = "Metadata_Well";
/// Imaged site within a well
pub const SITE: &str = "Metadata_Site";
/// Plate row of the well
pub const ROW: &str = "Metadata_Row";
/// Plate column of the well
pub const COL: &str = "Metadata_Col";
/// Whether the row comes from a repeat acquisition
pub const REIMAGED: &str = "Metadata_Reimaged";
/// Imaging channel of a stacked whole-image QC row
pub const CHANNEL: &str = "Channel";

/// Plate identifier as carried into single-cell profiles
pub const IMAGE_PLATE: &str = "Image_Metadata_Plate";
/// Well identifier as carried into single-cell profiles
pub const IMAGE_WELL: &str = "Image_Metadata_Well";
/// Site identifier as carried into single-cell profiles
pub const IMAGE_SITE: &str = "Image_Metadata_Site";

/// Returns true for identity/context columns that are never scored
pub fn is_metadata(name: &str) -> bool {
    name.starts_with(METADATA_PREFIX) || name.starts_with(IMAGE_METADATA_PREFIX)
}
