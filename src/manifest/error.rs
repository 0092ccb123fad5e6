use std::path::PathBuf;

/// Errors that can occur while assembling run and profile manifests
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The barcode platemap could not be parsed
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// A directory the manifest is built from does not exist
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),
}
