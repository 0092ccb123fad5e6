use crate::table::TableError;

/// Errors that can occur while reconciling re-imaged plates
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Table loading, reshaping or persisting failed
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// Arrow error
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// The plate identifier pattern is not a valid regular expression
    #[error("Invalid plate identifier pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Refusing to delete sources while some inputs were not reconciled
    #[error("{0} input file(s) were not used; sources kept")]
    UnusedInputs(usize),
}
