//! Packed f32 blob encoding.
//!
//! Embeddings cross the SQL boundary as BLOBs of contiguous little-endian
//! f32 values, `dimension * 4` bytes each.

use crate::vector::types::{BYTES_PER_F32, VectorDimension, VectorError};

/// Packs a vector into a little-endian f32 blob.
#[must_use]
pub fn encode_f32_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * BYTES_PER_F32);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes a blob that must hold exactly one vector of `dimension` values.
///
/// The size is checked before any value is read.
pub fn decode_f32_blob(bytes: &[u8], dimension: VectorDimension) -> Result<Vec<f32>, VectorError> {
    let expected = dimension.blob_len();
    if bytes.len() != expected {
        return Err(VectorError::InvalidBlobSize {
            expected,
            actual: bytes.len(),
        });
    }
    let mut vector = Vec::with_capacity(dimension.get());
    extend_from_blob(&mut vector, bytes);
    Ok(vector)
}

/// Appends the values of an already size-checked blob to `out`.
pub(crate) fn extend_from_blob(out: &mut Vec<f32>, bytes: &[u8]) {
    out.extend(bytes.chunks_exact(BYTES_PER_F32).map(|chunk| {
        f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
    }));
}
