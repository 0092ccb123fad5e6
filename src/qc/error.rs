use crate::table::TableError;

/// Errors that can occur during outlier detection, calibration and cleaning
#[derive(Debug, thiserror::Error)]
pub enum QcError {
    /// Table loading, reshaping or persisting failed
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A multiplier is zero, negative where unsigned is required, or not finite
    #[error("Invalid multiplier {multiplier} for feature {feature}")]
    InvalidMultiplier {
        /// Feature the multiplier was given for
        feature: String,
        /// Rejected multiplier
        multiplier: f64,
    },

    /// A threshold specification without any feature
    #[error("Feature threshold specification is empty")]
    EmptyThresholds,

    /// Too few non-null values to estimate the distribution
    #[error("Feature {feature} has {count} usable values; at least {required} are needed")]
    InsufficientData {
        /// Feature name
        feature: String,
        /// Non-null values found
        count: usize,
        /// Values required
        required: usize,
    },
}
