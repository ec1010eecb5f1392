#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{Connection, params};
use semsql::config::SourceConfig;
use semsql::vector::blob::encode_f32_blob;
use semsql::{EmbeddingGenerator, VectorDimension, VectorError};
use tempfile::TempDir;

/// A scratch SQLite database holding one embeddings table.
pub struct TestDatabase {
    pub dir: TempDir,
    pub path: PathBuf,
    pub source: SourceConfig,
}

impl TestDatabase {
    /// Creates `text_chunks_v2 (id, content, embedding)` in a temp directory.
    pub fn new() -> Self {
        Self::with_source(SourceConfig::default())
    }

    pub fn with_source(source: SourceConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("chunks.db");
        let conn = Connection::open(&path).expect("Failed to open database");
        conn.execute_batch(&format!(
            "CREATE TABLE {table} ({id} INTEGER PRIMARY KEY, content TEXT, {emb} BLOB)",
            table = source.table,
            id = source.id_column,
            emb = source.embedding_column,
        ))
        .expect("Failed to create table");
        Self { dir, path, source }
    }

    pub fn connection(&self) -> Connection {
        Connection::open(&self.path).expect("Failed to open database")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts a row with a packed f32 embedding.
    pub fn insert(&self, id: i64, content: &str, embedding: &[f32]) {
        self.insert_raw(id, content, Some(encode_f32_blob(embedding)));
    }

    /// Inserts a row with arbitrary (possibly malformed or NULL) payload.
    pub fn insert_raw(&self, id: i64, content: &str, payload: Option<Vec<u8>>) {
        let sql = format!(
            "INSERT INTO {table} ({id}, content, {emb}) VALUES (?1, ?2, ?3)",
            table = self.source.table,
            id = self.source.id_column,
            emb = self.source.embedding_column,
        );
        self.connection()
            .execute(&sql, params![id, content, payload])
            .expect("Failed to insert row");
    }
}

/// Encoder that marks one axis per known keyword.
///
/// "alpha" sets axis 0, "beta" axis 1, "gamma" axis 2. Anything else encodes
/// to the zero vector.
pub struct KeywordEncoder {
    dimension: VectorDimension,
}

impl KeywordEncoder {
    pub fn new(dimension: usize) -> Arc<Self> {
        Arc::new(Self {
            dimension: VectorDimension::new(dimension).expect("valid dimension"),
        })
    }
}

impl EmbeddingGenerator for KeywordEncoder {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut embedding = vec![0.0; self.dimension.get()];
                for (axis, word) in ["alpha", "beta", "gamma"].iter().enumerate() {
                    if axis < embedding.len() && text.contains(word) {
                        embedding[axis] = 1.0;
                    }
                }
                embedding
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Deterministic pseudo-random vectors (64-bit LCG), values in [-1, 1).
pub fn pseudo_random_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            (0..dimension)
                .map(|_| {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
                })
                .collect()
        })
        .collect()
}
