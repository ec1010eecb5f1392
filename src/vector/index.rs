//! Exact flat L2 index.
//!
//! All vectors live in one contiguous buffer. Search scans every vector and
//! ranks by squared Euclidean distance, so results are exact at the cost of
//! O(N * d) work per query.

use rayon::prelude::*;
use serde::Serialize;

use crate::vector::types::{BYTES_PER_F32, FLAT_L2_INDEX_TYPE, VectorDimension, VectorError};

/// Below this many vectors the scan stays on the calling thread.
const PARALLEL_SCAN_THRESHOLD: usize = 4096;

/// One search hit inside an index: insertion position plus distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Size and shape of a built index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub vectors: usize,
    pub dimension: usize,
    pub index_type: &'static str,
    pub memory_bytes: usize,
}

impl IndexStats {
    /// Memory estimate in mebibytes.
    #[must_use]
    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Flat index over `count` vectors of a fixed dimension.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimension: VectorDimension,
    data: Vec<f32>,
    count: usize,
}

impl FlatL2Index {
    /// Builds an index from individual vectors, in insertion order.
    ///
    /// Every vector must match `dimension`; the first mismatch aborts the build.
    pub fn build<V>(dimension: VectorDimension, vectors: &[V]) -> Result<Self, VectorError>
    where
        V: AsRef<[f32]>,
    {
        if vectors.is_empty() {
            return Err(VectorError::EmptyIndex);
        }
        let mut data = Vec::with_capacity(vectors.len() * dimension.get());
        for vector in vectors {
            let vector = vector.as_ref();
            dimension.validate_vector(vector)?;
            data.extend_from_slice(vector);
        }
        Ok(Self {
            dimension,
            count: vectors.len(),
            data,
        })
    }

    /// Builds an index that takes ownership of an already packed buffer.
    ///
    /// `data.len()` must be a non-zero multiple of the dimension.
    pub fn from_flat(dimension: VectorDimension, data: Vec<f32>) -> Result<Self, VectorError> {
        if data.is_empty() {
            return Err(VectorError::EmptyIndex);
        }
        let dim = dimension.get();
        if data.len() % dim != 0 {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                actual: data.len() % dim,
            });
        }
        Ok(Self {
            dimension,
            count: data.len() / dim,
            data,
        })
    }

    /// Returns the `k` nearest vectors to `query`, closest first.
    ///
    /// Returns fewer than `k` results when the index holds fewer vectors.
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        self.dimension.validate_vector(query)?;
        if k == 0 {
            return Err(VectorError::InvalidTopK(0));
        }

        let distances = self.distances(query);
        let mut candidates: Vec<Neighbor> = distances
            .into_iter()
            .enumerate()
            .filter(|(_, distance)| !distance.is_nan())
            .map(|(position, distance)| Neighbor { position, distance })
            .collect();

        let k = k.min(candidates.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if k < candidates.len() {
            candidates.select_nth_unstable_by(k - 1, compare_neighbors);
            candidates.truncate(k);
        }
        candidates.sort_unstable_by(compare_neighbors);
        Ok(candidates)
    }

    /// Squared L2 distance from `query` to every indexed vector, by position.
    fn distances(&self, query: &[f32]) -> Vec<f32> {
        let dim = self.dimension.get();
        if self.count >= PARALLEL_SCAN_THRESHOLD {
            self.data
                .par_chunks_exact(dim)
                .map(|vector| squared_l2(query, vector))
                .collect()
        } else {
            self.data
                .chunks_exact(dim)
                .map(|vector| squared_l2(query, vector))
                .collect()
        }
    }

    /// Returns the stored vector at `position`.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let dim = self.dimension.get();
        self.data.get(position * dim..(position + 1) * dim)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            vectors: self.count,
            dimension: self.dimension.get(),
            index_type: FLAT_L2_INDEX_TYPE,
            memory_bytes: self.count * self.dimension.get() * BYTES_PER_F32,
        }
    }
}

/// Squared Euclidean distance between two equal-length vectors.
///
/// Accumulates in f64 and saturates at `f32::MAX`, so finite inputs always
/// give a finite distance. NaN propagates.
#[inline]
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum();
    if sum > f64::from(f32::MAX) {
        f32::MAX
    } else {
        sum as f32
    }
}

/// Orders by distance, then by insertion position.
fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> std::cmp::Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.position.cmp(&b.position))
}
