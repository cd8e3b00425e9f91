use thiserror::Error;

/// Every way a plot or config request can fail
///
/// Each variant is terminal for the request that raised it and carries the
/// user-facing message shown by the web layer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A dataset has not been uploaded, or its file is gone from disk
    #[error("{0}")]
    MissingFile(String),

    /// No shared `main_id` and the two datasets differ in length
    #[error(
        "Feature and Target CSV files have different number of rows ({feature} vs {target}) and no common \"main_id\"."
    )]
    RowCountMismatch { feature: usize, target: usize },

    #[error("Constant value for '{0}' is not provided.")]
    MissingConstantValue(String),

    #[error("Parameter '{0}' not found in data.")]
    UnknownColumn(String),

    #[error("Invalid constant value for '{0}'. Must be a number or match string value.")]
    InvalidConstantValue(String),

    #[error("Please select X-axis, Y-axis, and Target parameter.")]
    MissingAxisOrTarget,

    #[error("{0}")]
    EmptyResult(String),

    #[error(
        "The configuration file was saved with different CSV files. Please load the matching CSVs first."
    )]
    ConfigMismatch,

    #[error("{0}")]
    MalformedConfig(String),

    #[error("JSON file not found: {0}")]
    ConfigNotFound(String),

    #[error("{0}")]
    InvalidUpload(String),

    /// The request body could not be read as the expected JSON
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to render plot: {0}")]
    Render(String),
}

impl PipelineError {
    /// True for failures caused by the server rather than by the request
    pub fn is_internal(&self) -> bool {
        matches!(self, PipelineError::Io(_) | PipelineError::Render(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
