//! Vector search engine that orchestrates index builds and queries.
//!
//! [`VectorSearchEngine`] owns the current index snapshot and a lazily
//! created encoder. It is an ordinary value: SQL functions share one through
//! an `Arc`, tests build as many independent engines as they need.
//!
//! # Build protocol
//! 1. Load rows from the source into fresh buffers
//! 2. Assemble a new [`FlatL2Index`] and [`IdMapping`] from those buffers
//! 3. Swap the new snapshot in under the write lock
//!
//! A failed or empty load never touches the committed snapshot. Searches
//! clone the snapshot `Arc`, so a concurrent rebuild cannot change the index
//! a query is reading from, and every position is resolved against the
//! mapping that produced it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::config::{EncoderBackend, Settings};
use crate::error::{ExtensionError, ExtensionResult};
use crate::storage::{EmbeddingSource, load_embeddings};
use crate::vector::blob::{decode_f32_blob, encode_f32_blob};
use crate::vector::{
    ChunkId, EmbeddingGenerator, FastEmbedGenerator, FlatL2Index, HashEmbeddingGenerator,
    IdMapping, IndexStats, Score, VectorDimension, VectorError, parse_embedding_model,
};

/// Number of results when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 5;

/// Creates the encoder on first use.
pub type EncoderFactory =
    Box<dyn Fn() -> Result<Arc<dyn EmbeddingGenerator>, VectorError> + Send + Sync>;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// 1-based rank
    pub rank: usize,
    pub chunk_id: ChunkId,
    /// Squared L2 distance
    #[serde(serialize_with = "serialize_4dp")]
    pub distance: f32,
    /// `1 / (1 + distance)`
    #[serde(serialize_with = "serialize_4dp")]
    pub similarity_score: f32,
}

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub generation: u64,
    pub vectors_loaded: usize,
    pub dimension: usize,
    pub index_type: &'static str,
    pub skipped_rows: usize,
}

/// Result of a build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// A new snapshot is live.
    Built(BuildReport),
    /// No row passed validation; the previous snapshot (if any) stays live.
    NoData { skipped_rows: usize },
}

/// Whether the engine currently has an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatus {
    Built(IndexStats),
    NotBuilt,
}

/// An immutable index together with the ids of its positions.
#[derive(Debug)]
pub struct IndexSnapshot {
    generation: u64,
    index: FlatL2Index,
    ids: IdMapping,
}

impl IndexSnapshot {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    #[must_use]
    pub fn ids(&self) -> &IdMapping {
        &self.ids
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorError> {
        self.index
            .search(query, k)?
            .into_iter()
            .enumerate()
            .map(|(i, neighbor)| {
                Ok(SearchHit {
                    rank: i + 1,
                    chunk_id: self.ids.resolve(neighbor.position)?,
                    distance: neighbor.distance,
                    similarity_score: Score::from_distance(neighbor.distance).get(),
                })
            })
            .collect()
    }
}

/// Main vector search engine.
///
/// This engine manages:
/// - The current index snapshot (replaced wholesale on each build)
/// - A lazily initialized text encoder
/// - Query validation and result ranking
pub struct VectorSearchEngine {
    dimension: VectorDimension,
    default_top_k: usize,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    generation: AtomicU64,
    encoder: Mutex<Option<Arc<dyn EmbeddingGenerator>>>,
    encoder_factory: EncoderFactory,
}

impl std::fmt::Debug for VectorSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSearchEngine")
            .field("dimension", &self.dimension)
            .field("default_top_k", &self.default_top_k)
            .field("status", &self.status())
            .field("encoder_ready", &self.encoder.lock().is_some())
            .finish()
    }
}

impl VectorSearchEngine {
    /// Creates an engine with the content-hash encoder and default top_k.
    #[must_use = "The created VectorSearchEngine should be used for building and searching"]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            default_top_k: DEFAULT_TOP_K,
            snapshot: RwLock::new(None),
            generation: AtomicU64::new(0),
            encoder: Mutex::new(None),
            encoder_factory: Box::new(move || {
                let encoder: Arc<dyn EmbeddingGenerator> =
                    Arc::new(HashEmbeddingGenerator::new(dimension));
                Ok::<_, VectorError>(encoder)
            }),
        }
    }

    /// Creates an engine configured from `settings`.
    ///
    /// The encoder is not created until the first text query or encode call.
    pub fn from_settings(settings: &Settings) -> ExtensionResult<Self> {
        let dimension = settings.index.dimension().map_err(|e| ExtensionError::Config {
            reason: e.to_string(),
        })?;
        if settings.index.default_top_k == 0 {
            return Err(ExtensionError::Config {
                reason: "index.default_top_k must be greater than zero".to_string(),
            });
        }

        let engine = Self::new(dimension).with_default_top_k(settings.index.default_top_k);
        let engine = match settings.encoder.backend {
            EncoderBackend::Hash => engine,
            EncoderBackend::FastEmbed => {
                let model = parse_embedding_model(&settings.encoder.model).map_err(|e| {
                    ExtensionError::Config {
                        reason: e.to_string(),
                    }
                })?;
                let cache_dir = settings.encoder.models_dir();
                let show_progress = settings.encoder.show_download_progress;
                engine.with_encoder_factory(move || {
                    let generator =
                        FastEmbedGenerator::new(model.clone(), cache_dir.clone(), show_progress)?;
                    Ok(Arc::new(generator) as Arc<dyn EmbeddingGenerator>)
                })
            }
        };
        Ok(engine)
    }

    /// Sets the number of results used when a query does not specify one.
    #[must_use]
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    /// Uses an already initialized encoder.
    #[must_use]
    pub fn with_encoder(self, encoder: Arc<dyn EmbeddingGenerator>) -> Self {
        *self.encoder.lock() = Some(encoder);
        self
    }

    /// Replaces how the encoder is created on first use.
    #[must_use]
    pub fn with_encoder_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn EmbeddingGenerator>, VectorError> + Send + Sync + 'static,
    {
        self.encoder_factory = Box::new(factory);
        *self.encoder.get_mut() = None;
        self
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Builds a new index from every valid row of `source`.
    ///
    /// Malformed rows are skipped. When nothing survives the filter the
    /// outcome is [`BuildOutcome::NoData`] and the current index is kept.
    pub fn build_from<S>(&self, source: &S) -> ExtensionResult<BuildOutcome>
    where
        S: EmbeddingSource + ?Sized,
    {
        let loaded = load_embeddings(source, self.dimension)?;
        if loaded.is_empty() {
            warn!(skipped = loaded.skipped_rows, "no embeddings found, keeping current index");
            return Ok(BuildOutcome::NoData {
                skipped_rows: loaded.skipped_rows,
            });
        }

        let skipped_rows = loaded.skipped_rows;
        let index = FlatL2Index::from_flat(self.dimension, loaded.data)?;
        let ids = IdMapping::new(loaded.chunk_ids);
        Ok(BuildOutcome::Built(self.install(index, ids, skipped_rows)))
    }

    /// Builds a new index from in-memory vectors.
    ///
    /// Unlike [`build_from`](Self::build_from) this is strict: any vector of
    /// the wrong length fails the whole build and the current index is kept.
    pub fn build_from_vectors(&self, vectors: &[(ChunkId, Vec<f32>)]) -> ExtensionResult<BuildOutcome> {
        if vectors.is_empty() {
            return Ok(BuildOutcome::NoData { skipped_rows: 0 });
        }
        let embeddings: Vec<&[f32]> = vectors.iter().map(|(_, v)| v.as_slice()).collect();
        let index = FlatL2Index::build(self.dimension, &embeddings)?;
        let ids = IdMapping::new(vectors.iter().map(|(id, _)| *id).collect());
        Ok(BuildOutcome::Built(self.install(index, ids, 0)))
    }

    fn install(&self, index: FlatL2Index, ids: IdMapping, skipped_rows: usize) -> BuildReport {
        let vectors_loaded = index.len();
        let dimension = index.dimension().get();
        let index_type = index.stats().index_type;

        // Generations are handed out under the write lock so that installs
        // land in generation order.
        let generation = {
            let mut slot = self.snapshot.write();
            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            *slot = Some(Arc::new(IndexSnapshot {
                generation,
                index,
                ids,
            }));
            generation
        };

        let report = BuildReport {
            generation,
            vectors_loaded,
            dimension,
            index_type,
            skipped_rows,
        };

        info!(
            generation,
            vectors = report.vectors_loaded,
            dimension = report.dimension,
            skipped = skipped_rows,
            "index built"
        );
        report
    }

    /// Drops the current index. Later searches fail with `IndexNotBuilt`.
    pub fn clear(&self) {
        if self.snapshot.write().take().is_some() {
            debug!("index cleared");
        }
    }

    /// The live snapshot, or `IndexNotBuilt`.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>, VectorError> {
        self.snapshot
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(VectorError::IndexNotBuilt)
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.snapshot.read().is_some()
    }

    #[must_use]
    pub fn stats(&self) -> Option<IndexStats> {
        self.snapshot.read().as_ref().map(|s| s.index.stats())
    }

    #[must_use]
    pub fn status(&self) -> IndexStatus {
        match self.stats() {
            Some(stats) => IndexStatus::Built(stats),
            None => IndexStatus::NotBuilt,
        }
    }

    /// Nearest chunks to a precomputed query vector.
    ///
    /// The query must have exactly the index dimension.
    pub fn search_by_vector(
        &self,
        query: &[f32],
        top_k: Option<usize>,
    ) -> ExtensionResult<Vec<SearchHit>> {
        let snapshot = self.snapshot()?;
        let k = self.resolve_top_k(top_k)?;
        self.dimension.validate_vector(query)?;
        Ok(snapshot.search(query, k)?)
    }

    /// Nearest chunks to a packed f32 query blob.
    ///
    /// The blob size is checked before anything is decoded.
    pub fn search_by_blob(&self, blob: &[u8], top_k: Option<usize>) -> ExtensionResult<Vec<SearchHit>> {
        let snapshot = self.snapshot()?;
        let k = self.resolve_top_k(top_k)?;
        let query = decode_f32_blob(blob, self.dimension)?;
        Ok(snapshot.search(&query, k)?)
    }

    /// Nearest chunks to the embedding of `text`.
    pub fn search_by_text(&self, text: &str, top_k: Option<usize>) -> ExtensionResult<Vec<SearchHit>> {
        let snapshot = self.snapshot()?;
        let k = self.resolve_top_k(top_k)?;
        let query = self.encode_text(text)?;
        Ok(snapshot.search(&query, k)?)
    }

    /// Nearest chunks to an already indexed chunk, using its stored vector.
    ///
    /// The chunk itself is included in the results, normally at rank 1.
    pub fn search_by_chunk(&self, id: ChunkId, top_k: Option<usize>) -> ExtensionResult<Vec<SearchHit>> {
        let snapshot = self.snapshot()?;
        let k = self.resolve_top_k(top_k)?;
        let query = snapshot
            .ids
            .position_of(id)
            .and_then(|position| snapshot.index.vector(position))
            .ok_or(VectorError::ChunkNotIndexed(id))?;
        Ok(snapshot.search(query, k)?)
    }

    /// Encodes `text`, checking the output against the index dimension.
    pub fn encode_text(&self, text: &str) -> ExtensionResult<Vec<f32>> {
        let encoder = self.encoder()?;
        let embedding = encoder.embed_one(text)?;
        self.dimension.validate_vector(&embedding)?;
        Ok(embedding)
    }

    /// Encodes `text` as a packed little-endian f32 blob.
    pub fn encode_text_blob(&self, text: &str) -> ExtensionResult<Vec<u8>> {
        Ok(encode_f32_blob(&self.encode_text(text)?))
    }

    /// Returns the encoder, creating it on first use.
    ///
    /// A failed initialization is returned to the caller and not cached, so
    /// the next call tries again.
    pub fn encoder(&self) -> Result<Arc<dyn EmbeddingGenerator>, VectorError> {
        let mut slot = self.encoder.lock();
        if let Some(encoder) = slot.as_ref() {
            return Ok(Arc::clone(encoder));
        }

        let encoder = (self.encoder_factory)().inspect_err(|e| {
            warn!(error = %e, "encoder initialization failed");
        })?;
        info!(dimension = encoder.dimension().get(), "encoder initialized");
        *slot = Some(Arc::clone(&encoder));
        Ok(encoder)
    }

    fn resolve_top_k(&self, top_k: Option<usize>) -> Result<usize, VectorError> {
        match top_k {
            None => Ok(self.default_top_k),
            Some(0) => Err(VectorError::InvalidTopK(0)),
            Some(k) => Ok(k),
        }
    }
}

fn serialize_4dp<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_4dp(*value))
}

/// Rounds to four decimal places for display.
#[must_use]
pub fn round_4dp(value: f32) -> f64 {
    (f64::from(value) * 10_000.0).round() / 10_000.0
}
