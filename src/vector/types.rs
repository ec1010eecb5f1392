//! Type-safe wrappers and core types for vector search functionality.
//!
//! Newtypes keep chunk identifiers, dimensions and scores from being mixed
//! up with plain integers and floats at the API boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard embedding dimension (all-MiniLM-L6-v2 model).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Number of bytes per packed f32 value.
pub const BYTES_PER_F32: usize = 4;

/// Tag reported for the exact flat L2 index.
pub const FLAT_L2_INDEX_TYPE: &str = "FlatL2";

/// External identifier of an indexed text chunk.
///
/// Opaque to the index; usually the row key of the source table. Zero and
/// negative values are valid row keys, so this wraps a plain `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(i64);

impl ChunkId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ChunkId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe wrapper for similarity scores.
///
/// Scores live in the range (0.0, 1.0] where 1.0 is an exact match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(f32);

impl Score {
    /// Converts a squared L2 distance into a similarity score.
    ///
    /// Uses `1 / (1 + distance)`, which is 1.0 at distance zero and strictly
    /// decreasing as the distance grows. Distances are clamped to
    /// `[0, f32::MAX]`, which keeps the score above zero.
    #[must_use]
    pub fn from_distance(distance: f32) -> Self {
        Self(1.0 / (1.0 + distance.clamp(0.0, f32::MAX)))
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// Every vector entering an index or a query is validated against one of
/// these so that mismatched embedding models fail loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Size in bytes of one packed f32 vector of this dimension.
    #[must_use]
    pub const fn blob_len(&self) -> usize {
        self.0 * BYTES_PER_F32
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl Default for VectorDimension {
    fn default() -> Self {
        Self::dimension_384()
    }
}

impl TryFrom<usize> for VectorDimension {
    type Error = VectorError;

    fn try_from(dim: usize) -> Result<Self, Self::Error> {
        Self::new(dim)
    }
}

impl From<VectorDimension> for usize {
    fn from(dim: VectorDimension) -> usize {
        dim.0
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Index not built\nSuggestion: Call the build_index function first")]
    IndexNotBuilt,

    #[error("Cannot build an index from zero vectors")]
    EmptyIndex,

    #[error("Invalid top_k value: {0}\nSuggestion: Pass a positive number of results")]
    InvalidTopK(i64),

    #[error(
        "Invalid embedding size: expected {expected} bytes, got {actual}\nSuggestion: Pass a blob of packed little-endian f32 values"
    )]
    InvalidBlobSize { expected: usize, actual: usize },

    #[error("Chunk {0} is not in the current index")]
    ChunkNotIndexed(ChunkId),

    #[error("Index position {position} out of range for an index of {len} vectors")]
    PositionOutOfRange { position: usize, len: usize },

    #[error(
        "Failed to initialize encoder: {0}\nSuggestion: Check the encoder settings and model cache directory"
    )]
    EncoderInit(String),

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    EmbeddingFailed(String),
}
