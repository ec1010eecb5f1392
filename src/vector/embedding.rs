//! Embedding generation for text queries.
//!
//! The search engine only depends on [`EmbeddingGenerator`]. Two backends
//! ship with the crate:
//!
//! - [`HashEmbeddingGenerator`]: a deterministic content-hash stand-in with
//!   no model download, used by default and wherever reproducible vectors
//!   matter more than semantics.
//! - [`FastEmbedGenerator`]: real sentence embeddings through fastembed
//!   (AllMiniLML6V2 by default, 384 dimensions).

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};

use crate::vector::{VectorDimension, VectorError};

/// Trait for generating embeddings from text.
///
/// Implementations must be deterministic for a given instance: the same
/// text always yields the same vector.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts, one per input, in order.
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Generate the embedding for a single text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        self.generate_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("encoder returned no embedding".to_string()))
    }
}

/// Content-hash encoder.
///
/// Seeds from the SHA-256 of the text and fills component `i` with
/// `((seed + i) mod 1000) / 1000`. Carries no semantic meaning.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingGenerator {
    dimension: VectorDimension,
}

impl HashEmbeddingGenerator {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    fn seed(text: &str) -> u64 {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(seed)
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let seed = Self::seed(text);
        (0..self.dimension.get() as u64)
            .map(|i| (seed.wrapping_add(i) % 1000) as f32 / 1000.0)
            .collect()
    }
}

impl Default for HashEmbeddingGenerator {
    fn default() -> Self {
        Self::new(VectorDimension::dimension_384())
    }
}

impl EmbeddingGenerator for HashEmbeddingGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// FastEmbed implementation.
///
/// The model is downloaded to the cache directory on first construction.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &"<TextEmbedding>")
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Create a generator for `model`, caching weights under `cache_dir`.
    ///
    /// # Errors
    /// Returns `EncoderInit` if the model fails to download or load.
    pub fn new(
        model: EmbeddingModel,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, VectorError> {
        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| VectorError::EncoderInit(format!(
            "{e}. Ensure you have internet connection for first-time model download"
        )))?;

        // Get dimensions by generating a test embedding
        let probe = text_model
            .embed(vec!["test"], None)
            .map_err(|e| VectorError::EncoderInit(format!("probe embedding failed: {e}")))?;
        let width = probe.first().map(Vec::len).unwrap_or(0);
        let dimension = VectorDimension::new(width)?;

        Ok(Self {
            model: Mutex::new(text_model),
            dimension,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(texts.to_vec(), None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Parses a model name from configuration.
///
/// Accepts the fastembed variant names, case-insensitively.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    match name.to_ascii_lowercase().as_str() {
        "allminilml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "allminilml12v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        "bgebaseenv15" => Ok(EmbeddingModel::BGEBaseENV15),
        "multilinguale5small" => Ok(EmbeddingModel::MultilingualE5Small),
        _ => Err(VectorError::EncoderInit(format!(
            "unknown embedding model '{name}'. Supported: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, BGEBaseENV15, MultilingualE5Small"
        ))),
    }
}

/// Mock embedding generator for testing.
///
/// Deterministic embeddings keyed on a few marker words.
#[cfg(test)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
}

#[cfg(test)]
impl MockEmbeddingGenerator {
    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self { dimension }
    }
}

#[cfg(test)]
impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        let dim = self.dimension.get();
        let embeddings = texts
            .iter()
            .map(|text| {
                let mut embedding = vec![0.0; dim];
                if text.contains("origin") {
                    return embedding;
                }
                if text.contains("east") {
                    embedding[0] = 1.0;
                }
                if text.contains("north") && dim > 1 {
                    embedding[1] = 1.0;
                }
                embedding
            })
            .collect();
        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}
