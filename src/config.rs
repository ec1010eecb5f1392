//! Configuration module.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.semsql/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SEMSQL_` and use double
//! underscores to separate nested levels:
//! - `SEMSQL_INDEX__DEFAULT_TOP_K=10` sets `index.default_top_k`
//! - `SEMSQL_SOURCE__TABLE=chunks` sets `source.table`
//! - `SEMSQL_ENCODER__BACKEND=fastembed` sets `encoder.backend`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vector::{VECTOR_DIMENSION_384, VectorDimension, VectorError};

/// Directory holding the settings file, relative to the workspace root.
pub const CONFIG_DIR: &str = ".semsql";

/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// SQLite database used by the command-line tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Global debug mode
    #[serde(default)]
    pub debug: bool,

    /// Where embeddings are read from
    #[serde(default)]
    pub source: SourceConfig,

    /// Index shape and query defaults
    #[serde(default)]
    pub index: IndexConfig,

    /// Text encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// SQL function registration
    #[serde(default)]
    pub sql: SqlConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Table holding one embedding per chunk
    #[serde(default = "default_table")]
    pub table: String,

    /// Integer row key column
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// BLOB column of packed little-endian f32 values
    #[serde(default = "default_embedding_column")]
    pub embedding_column: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Embedding dimension; rows of any other size are skipped
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Number of results when a query gives no top_k
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    /// Deterministic content-hash vectors, no model required
    #[default]
    Hash,
    /// fastembed sentence embeddings
    FastEmbed,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    #[serde(default)]
    pub backend: EncoderBackend,

    /// fastembed model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Model cache directory (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar while downloading the model
    #[serde(default)]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SqlConfig {
    /// Prefix for registered function names (`<prefix>_search`, ...)
    #[serde(default = "default_function_prefix")]
    pub function_prefix: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_table() -> String {
    "text_chunks_v2".to_string()
}
fn default_id_column() -> String {
    "id".to_string()
}
fn default_embedding_column() -> String {
    "embedding".to_string()
}
fn default_dimension() -> usize {
    VECTOR_DIMENSION_384
}
fn default_top_k() -> usize {
    5
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_function_prefix() -> String {
    "vec".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            database: None,
            debug: false,
            source: SourceConfig::default(),
            index: IndexConfig::default(),
            encoder: EncoderConfig::default(),
            sql: SqlConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            id_column: default_id_column(),
            embedding_column: default_embedding_column(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            default_top_k: default_top_k(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: EncoderBackend::default(),
            model: default_embedding_model(),
            cache_dir: None,
            show_download_progress: false,
        }
    }
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            function_prefix: default_function_prefix(),
        }
    }
}

impl IndexConfig {
    /// Validated index dimension.
    pub fn dimension(&self) -> Result<VectorDimension, VectorError> {
        VectorDimension::new(self.dimension)
    }
}

impl EncoderConfig {
    /// Model cache directory, falling back to `<user cache>/semsql/models`.
    pub fn models_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("semsql")
                .join("models")
        })
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| Path::new(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file (missing files are ignored)
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref())
            .extract::<Settings>()
            .map_err(Box::new)
            .and_then(|settings| settings.validated())
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels; single underscores stay
            .merge(Env::prefixed("SEMSQL_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    fn validated(self) -> Result<Self, Box<figment::Error>> {
        if self.index.dimension == 0 {
            return Err(Box::new(figment::Error::from(
                "index.dimension must be greater than zero".to_string(),
            )));
        }
        if self.index.default_top_k == 0 {
            return Err(Box::new(figment::Error::from(
                "index.default_top_k must be greater than zero".to_string(),
            )));
        }
        Ok(self)
    }

    /// Find the settings file by looking for a `.semsql` directory,
    /// searching from the current directory up to the root.
    pub fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join(CONFIG_FILE));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a commented settings template into `dir/.semsql/settings.toml`.
    pub fn init_config_file(dir: &Path, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&config_path, Self::template())?;
        Ok(config_path)
    }

    fn template() -> String {
        format!(
            r#"# semsql configuration file

# Version of the configuration schema
version = {version}

# SQLite database used by the command-line tool
# database = "chunks.db"

# Global debug mode
debug = false

[source]
# Table with one embedding BLOB per chunk, read in ascending id order
table = "{table}"
id_column = "{id_column}"
embedding_column = "{embedding_column}"

[index]
# Embedding dimension; rows of any other size are skipped during build
dimension = {dimension}

# Number of results when a query does not pass top_k
default_top_k = {top_k}

[encoder]
# "hash" (deterministic stand-in, no download) or "fastembed"
backend = "hash"

# fastembed model name
model = "{model}"

# Show download progress on first use of a fastembed model
show_download_progress = false

# cache_dir = "/path/to/models"

[sql]
# Functions are registered as <prefix>_build_index, <prefix>_search, ...
function_prefix = "{prefix}"
"#,
            version = default_version(),
            table = default_table(),
            id_column = default_id_column(),
            embedding_column = default_embedding_column(),
            dimension = default_dimension(),
            top_k = default_top_k(),
            model = default_embedding_model(),
            prefix = default_function_prefix(),
        )
    }
}
