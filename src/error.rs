//! Error types for the search extension
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use thiserror::Error;

use crate::storage::StorageError;
use crate::vector::VectorError;

/// Main error type for build and search operations
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// Index, query and encoder errors
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// Row source errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// A required SQL function argument was not supplied
    #[error("Usage: {usage}")]
    MissingArgument { usage: String },

    /// A SQL function argument had the wrong type or value
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}

impl ExtensionError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Vector(err) => match err {
                VectorError::IndexNotBuilt => "INDEX_NOT_BUILT",
                VectorError::EmptyIndex => "NO_DATA",
                VectorError::EncoderInit(_) => "ENCODER_INIT_FAILED",
                VectorError::EmbeddingFailed(_) => "ENCODE_FAILED",
                VectorError::InvalidBlobSize { .. } => "INVALID_EMBEDDING_SIZE",
                VectorError::DimensionMismatch { .. } | VectorError::InvalidDimension { .. } => {
                    "DIMENSION_MISMATCH"
                }
                VectorError::InvalidTopK(_) => "INVALID_ARGUMENT",
                VectorError::ChunkNotIndexed(_) => "NOT_FOUND",
                VectorError::PositionOutOfRange { .. } => "INTERNAL_ERROR",
            },
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::MissingArgument { .. } => "MISSING_ARGUMENT",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Vector(VectorError::IndexNotBuilt) => vec![
                "Run the build_index function (or 'semsql build') before searching",
            ],
            Self::Vector(VectorError::EncoderInit(_)) => vec![
                "Check [encoder] in .semsql/settings.toml",
                "Use backend = \"hash\" to search without downloading a model",
            ],
            Self::Vector(VectorError::InvalidBlobSize { .. })
            | Self::Vector(VectorError::DimensionMismatch { .. }) => vec![
                "Ensure the query vector was produced by the same embedding model as the index",
                "Check index.dimension in the configuration",
            ],
            Self::Storage(StorageError::Sqlite(_)) => vec![
                "Check that the source table and columns in [source] exist",
            ],
            Self::Config { .. } => vec!["Run 'semsql init --force' to regenerate the settings file"],
            _ => vec![],
        }
    }
}

/// Result type alias for extension operations
pub type ExtensionResult<T> = Result<T, ExtensionError>;
