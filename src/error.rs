//! Error types for the feature pipeline

use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the feature pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Empty table: {0}")]
    EmptyTable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Pipeline failed during {stage}: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PipelineError {
    /// Attach the stage an error surfaced in. Already-staged errors keep their original stage.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            staged @ PipelineError::Stage { .. } => staged,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// True for failures of the persistence collaborator rather than of the computation
    pub fn is_storage(&self) -> bool {
        match self {
            PipelineError::StorageError(_) => true,
            PipelineError::Stage { source, .. } => source.is_storage(),
            _ => false,
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::StorageError(err.to_string())
    }
}
