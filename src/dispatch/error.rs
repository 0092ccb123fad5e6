use std::path::PathBuf;

/// Errors that can occur while launching external tools
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A pipeline file or image directory does not exist
    #[error("Path not found: {}", .0.display())]
    MissingPath(PathBuf),

    /// More jobs than the machine can run at once
    #[error("{requested} jobs exceed the {available} available workers; reduce the number of plates")]
    TooManyWorkers {
        /// Jobs in the batch
        requested: usize,
        /// Available parallelism
        available: usize,
    },

    /// The external program could not be started
    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        /// Program name
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The LoadData generator exited unsuccessfully
    #[error("LoadData generation failed for {plate} ({status})")]
    LoadDataFailed {
        /// Plate being generated
        plate: String,
        /// Exit status as reported by the OS
        status: String,
    },

    /// A worker thread panicked
    #[error("Worker for {0} panicked")]
    WorkerPanicked(String),
}
