use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("No years supplied for consolidation")]
    NoYears,

    #[error("Invalid adjustment '{key}': {details}")]
    InvalidAdjustment { key: String, details: String },

    #[error("Row id '{0}' is used by more than one calculated row")]
    DuplicateRowId(String),

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("Invalid project definition: {0}")]
    InvalidProject(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
