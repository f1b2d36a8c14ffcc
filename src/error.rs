use thiserror::Error;

/// Recording export error types
///
/// The orientation math never fails; only writing an archive can.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid export options: {0}")]
    InvalidOptions(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
