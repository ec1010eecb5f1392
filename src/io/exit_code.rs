//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed (an empty result list is still success)
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - internal inconsistency that should halt automation
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::ExtensionError;
use crate::vector::{BuildOutcome, VectorError};

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Critical error that should halt automation (code 2)
    BlockingError = 2,

    /// No embeddings to index, or the requested chunk is not indexed (code 3)
    NotFound = 3,

    /// Invalid query or argument (code 4)
    InvalidInput = 4,

    /// Database error (code 5)
    StorageError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Encoder could not be created or failed to encode (code 7)
    EncoderError = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Exit code for a build attempt: a build that found nothing is `NotFound`.
    pub fn from_build_outcome(outcome: &BuildOutcome) -> Self {
        match outcome {
            BuildOutcome::Built(_) => ExitCode::Success,
            BuildOutcome::NoData { .. } => ExitCode::NotFound,
        }
    }

    /// Convert an `ExtensionError` to the appropriate exit code.
    ///
    /// Maps specific error types to semantic exit codes that scripts
    /// can use to determine appropriate recovery actions.
    pub fn from_error(error: &ExtensionError) -> Self {
        match error {
            ExtensionError::Vector(err) => match err {
                VectorError::IndexNotBuilt
                | VectorError::EmptyIndex
                | VectorError::ChunkNotIndexed(_) => ExitCode::NotFound,

                VectorError::DimensionMismatch { .. }
                | VectorError::InvalidBlobSize { .. }
                | VectorError::InvalidTopK(_) => ExitCode::InvalidInput,

                VectorError::InvalidDimension { .. } => ExitCode::ConfigError,

                VectorError::EncoderInit(_) | VectorError::EmbeddingFailed(_) => {
                    ExitCode::EncoderError
                }

                // A position without an id means the snapshot is inconsistent
                VectorError::PositionOutOfRange { .. } => ExitCode::BlockingError,
            },
            ExtensionError::Storage(_) => ExitCode::StorageError,
            ExtensionError::Config { .. } => ExitCode::ConfigError,
            ExtensionError::MissingArgument { .. } | ExtensionError::InvalidArgument { .. } => {
                ExitCode::InvalidInput
            }
        }
    }

    /// Check if this exit code indicates a blocking error.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - automation should halt",
            ExitCode::NotFound => "Not found",
            ExitCode::InvalidInput => "Invalid input",
            ExitCode::StorageError => "Storage error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::EncoderError => "Encoder error",
        }
    }
}
