//! Exact nearest-neighbor search over chunk embeddings stored in SQLite,
//! exposed as SQL scalar functions.

pub mod config;
pub mod display;
pub mod error;
pub mod io;
pub mod sql;
pub mod storage;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{ExtensionError, ExtensionResult};
pub use sql::register_functions;
pub use storage::{EmbeddingSource, SqliteEmbeddingSource, StorageError, StorageResult};
pub use vector::{
    BuildOutcome, BuildReport, ChunkId, EmbeddingGenerator, FlatL2Index, IndexStats, IndexStatus,
    SearchHit, VectorDimension, VectorError, VectorSearchEngine,
};
