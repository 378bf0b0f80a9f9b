use std::path::PathBuf;

use store::MaintenanceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to read feed {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV feed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed JSON feed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON feed must be an array")]
    NotAnArray,

    #[error("Unsupported feed format {0}, expected .csv or .json")]
    UnsupportedFormat(PathBuf),
}

/// One simulator insertion that failed. Recovered inside the tick, never propagated.
#[derive(Error, Debug)]
#[error("Row {index} ({subject:?}) was not inserted: {source}")]
pub struct IngestionRowFailure {
    pub index: usize,
    pub subject: String,
    #[source]
    pub source: MaintenanceError,
}
