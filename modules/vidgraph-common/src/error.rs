use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidGraphError {
    /// A malformed input row. The row is rejected; ingestion of other rows continues.
    #[error("Validation error at row {row}: {reason}")]
    Validation { row: usize, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No fulltext index for {label}.{property}")]
    MissingIndex { label: String, property: String },

    #[error("Storage backend unavailable ({context}): {message}")]
    Connectivity { context: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl VidGraphError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        VidGraphError::InvalidArgument(msg.into())
    }

    pub fn connectivity(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        VidGraphError::Connectivity {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T, E = VidGraphError> = std::result::Result<T, E>;
