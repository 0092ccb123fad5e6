/// Errors that can occur while loading, reshaping or persisting tables
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Column exists but does not hold numeric values
    #[error("Column is not numeric: {name} ({data_type})")]
    NonNumericColumn {
        /// Column name
        name: String,
        /// Arrow type found in the table
        data_type: String,
    },

    /// File extension is not a supported table format
    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),

    /// Row identities do not line up with the rows of the batch
    #[error("Row identity count {ids} does not match row count {rows}")]
    RowIdMismatch {
        /// Rows in the batch
        rows: usize,
        /// Row identities supplied
        ids: usize,
    },

    /// Operation requires at least one table
    #[error("No tables to concatenate")]
    Empty,
}
