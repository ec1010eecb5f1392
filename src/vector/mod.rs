//! Vector search over chunk embeddings.
//!
//! Embeddings are held in an exact flat L2 index. Each index position maps
//! back to the chunk id it was loaded from, and queries arrive either as
//! text (encoded on the fly) or as a packed f32 blob.
//!
//! # Architecture
//! - [`FlatL2Index`]: contiguous vector buffer scanned on every query
//! - [`IdMapping`]: position to chunk id, in insertion order
//! - [`EmbeddingGenerator`]: pluggable text encoder
//! - [`VectorSearchEngine`]: owns the live snapshot and the encoder

pub mod blob;
mod embedding;
mod engine;
mod id_map;
mod index;
mod types;

#[cfg(test)]
pub use embedding::MockEmbeddingGenerator;
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, HashEmbeddingGenerator, parse_embedding_model,
};
pub use engine::{
    BuildOutcome, BuildReport, DEFAULT_TOP_K, EncoderFactory, IndexSnapshot, IndexStatus,
    SearchHit, VectorSearchEngine, round_4dp,
};
pub use id_map::IdMapping;
pub use index::{FlatL2Index, IndexStats, Neighbor, squared_l2};
pub use types::{
    BYTES_PER_F32, ChunkId, FLAT_L2_INDEX_TYPE, Score, VECTOR_DIMENSION_384, VectorDimension,
    VectorError,
};
