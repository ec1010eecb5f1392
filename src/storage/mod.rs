//! Embedding row sources.
//!
//! Reads `(id, embedding blob)` rows from SQLite (or any other source that
//! implements [`EmbeddingSource`]) and turns them into packed vectors ready
//! for index construction.

pub mod error;
pub mod source;

pub use error::{StorageError, StorageResult};
pub use source::{
    EmbeddingSource, LoadedEmbeddings, RawEmbeddingRow, SqliteEmbeddingSource, load_embeddings,
};
