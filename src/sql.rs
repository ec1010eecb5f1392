//! SQL scalar functions over a shared [`VectorSearchEngine`].
//!
//! [`register_functions`] installs five functions on a connection, named with
//! the configured prefix (`vec` by default):
//!
//! | Function | Result |
//! |---|---|
//! | `vec_build_index()` | build status JSON |
//! | `vec_search(text [, top_k])` | JSON array of hits |
//! | `vec_search_vector(blob [, top_k])` | JSON array of hits |
//! | `vec_index_stats()` | stats JSON |
//! | `vec_encode_text(text)` | embedding BLOB |
//!
//! Failures are raised as SQL function errors carrying the error message.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use rusqlite::Connection;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use serde::Serialize;
use tracing::debug;

use crate::config::{SourceConfig, SqlConfig};
use crate::error::{ExtensionError, ExtensionResult};
use crate::storage::SqliteEmbeddingSource;
use crate::vector::{BuildOutcome, IndexStatus, SearchHit, VectorError, VectorSearchEngine};

/// Message reported when a build finds nothing to index.
pub const NO_EMBEDDINGS_MESSAGE: &str = "No embeddings found";

/// Message reported by the stats function before the first build.
pub const NOT_BUILT_MESSAGE: &str = "Index not built yet";

/// JSON body returned by the build function.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum BuildStatus<'a> {
    Success {
        vectors_loaded: usize,
        dimension: usize,
        index_type: &'a str,
        skipped_rows: usize,
    },
    Error {
        message: &'a str,
    },
}

/// JSON body returned by the stats function.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum StatsReport<'a> {
    Built {
        vectors: usize,
        dimension: usize,
        index_type: &'a str,
        memory_mb: f64,
    },
    NotBuilt {
        status: &'a str,
        message: &'a str,
    },
}

/// Renders a build outcome as the build function's JSON.
pub fn build_status_json(outcome: &BuildOutcome) -> serde_json::Result<String> {
    let status = match outcome {
        BuildOutcome::Built(report) => BuildStatus::Success {
            vectors_loaded: report.vectors_loaded,
            dimension: report.dimension,
            index_type: report.index_type,
            skipped_rows: report.skipped_rows,
        },
        BuildOutcome::NoData { .. } => BuildStatus::Error {
            message: NO_EMBEDDINGS_MESSAGE,
        },
    };
    serde_json::to_string(&status)
}

/// Renders index status as the stats function's JSON.
pub fn stats_json(status: &IndexStatus) -> serde_json::Result<String> {
    let report = match status {
        IndexStatus::Built(stats) => StatsReport::Built {
            vectors: stats.vectors,
            dimension: stats.dimension,
            index_type: stats.index_type,
            memory_mb: (stats.memory_mb() * 100.0).round() / 100.0,
        },
        IndexStatus::NotBuilt => StatsReport::NotBuilt {
            status: "not_built",
            message: NOT_BUILT_MESSAGE,
        },
    };
    serde_json::to_string(&report)
}

/// Renders search hits as a JSON array.
pub fn hits_json(hits: &[SearchHit]) -> serde_json::Result<String> {
    serde_json::to_string(hits)
}

/// Names of the registered functions for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionNames {
    pub build_index: String,
    pub search: String,
    pub search_vector: String,
    pub index_stats: String,
    pub encode_text: String,
}

impl FunctionNames {
    /// Derives the names from `prefix`, which must be a plain identifier.
    pub fn new(prefix: &str) -> ExtensionResult<Self> {
        let valid = !prefix.is_empty()
            && !prefix.starts_with(|c: char| c.is_ascii_digit())
            && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ExtensionError::Config {
                reason: format!(
                    "sql.function_prefix '{prefix}' must contain only letters, digits and underscores"
                ),
            });
        }
        Ok(Self {
            build_index: format!("{prefix}_build_index"),
            search: format!("{prefix}_search"),
            search_vector: format!("{prefix}_search_vector"),
            index_stats: format!("{prefix}_index_stats"),
            encode_text: format!("{prefix}_encode_text"),
        })
    }
}

/// Registers the search functions on `conn`.
///
/// Every function shares `engine`, so an index built through one connection
/// is visible to every other connection holding the same engine. The build
/// function reads from whichever connection invokes it.
pub fn register_functions(
    conn: &Connection,
    engine: Arc<VectorSearchEngine>,
    sql: &SqlConfig,
    source: &SourceConfig,
) -> ExtensionResult<()> {
    let names = FunctionNames::new(&sql.function_prefix)?;
    // Reject bad identifiers now instead of on the first build
    SqliteEmbeddingSource::new(conn, source)?;

    let flags = FunctionFlags::SQLITE_UTF8;

    {
        let engine = AssertUnwindSafe(Arc::clone(&engine));
        let source = source.clone();
        conn.create_scalar_function(names.build_index.as_str(), 0, flags, move |ctx| {
            build_index(ctx, &engine, &source).map_err(into_sql_error)
        })
        .map_err(sqlite_error)?;
    }

    {
        let engine = AssertUnwindSafe(Arc::clone(&engine));
        let usage = format!("{}(query, [top_k])", names.search);
        conn.create_scalar_function(names.search.as_str(), -1, flags, move |ctx| {
            search_by_text(ctx, &engine, &usage).map_err(into_sql_error)
        })
        .map_err(sqlite_error)?;
    }

    {
        let engine = AssertUnwindSafe(Arc::clone(&engine));
        let usage = format!("{}(embedding, [top_k])", names.search_vector);
        conn.create_scalar_function(names.search_vector.as_str(), -1, flags, move |ctx| {
            search_by_vector(ctx, &engine, &usage).map_err(into_sql_error)
        })
        .map_err(sqlite_error)?;
    }

    {
        let engine = AssertUnwindSafe(Arc::clone(&engine));
        conn.create_scalar_function(names.index_stats.as_str(), 0, flags, move |_ctx| {
            stats_json(&engine.status()).map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
        })
        .map_err(sqlite_error)?;
    }

    {
        let engine = AssertUnwindSafe(engine);
        conn.create_scalar_function(names.encode_text.as_str(), 1, flags, move |ctx| {
            encode_text(ctx, &engine).map_err(into_sql_error)
        })
        .map_err(sqlite_error)?;
    }

    debug!(prefix = %sql.function_prefix, "registered search functions");
    Ok(())
}

fn build_index(
    ctx: &Context<'_>,
    engine: &VectorSearchEngine,
    source: &SourceConfig,
) -> ExtensionResult<String> {
    // SAFETY: the connection is only used for a read-only SELECT while this
    // call runs and the handle is not kept past it.
    let conn = unsafe { ctx.get_connection() }.map_err(sqlite_error)?;
    let rows = SqliteEmbeddingSource::new(&conn, source)?;
    let outcome = engine.build_from(&rows)?;
    build_status_json(&outcome).map_err(json_error)
}

fn search_by_text(
    ctx: &Context<'_>,
    engine: &VectorSearchEngine,
    usage: &str,
) -> ExtensionResult<String> {
    check_arity(ctx, usage)?;
    let query = text_arg(ctx, 0, "query")?;
    let top_k = top_k_arg(ctx, 1)?;
    let hits = engine.search_by_text(query, top_k)?;
    hits_json(&hits).map_err(json_error)
}

fn search_by_vector(
    ctx: &Context<'_>,
    engine: &VectorSearchEngine,
    usage: &str,
) -> ExtensionResult<String> {
    check_arity(ctx, usage)?;
    let blob = ctx
        .get_raw(0)
        .as_blob()
        .map_err(|e| ExtensionError::InvalidArgument {
            name: "embedding",
            reason: e.to_string(),
        })?;
    let top_k = top_k_arg(ctx, 1)?;
    let hits = engine.search_by_blob(blob, top_k)?;
    hits_json(&hits).map_err(json_error)
}

fn encode_text(ctx: &Context<'_>, engine: &VectorSearchEngine) -> ExtensionResult<Vec<u8>> {
    let text = text_arg(ctx, 0, "text")?;
    engine.encode_text_blob(text)
}

fn check_arity(ctx: &Context<'_>, usage: &str) -> ExtensionResult<()> {
    if ctx.is_empty() || ctx.len() > 2 {
        return Err(ExtensionError::MissingArgument {
            usage: usage.to_string(),
        });
    }
    Ok(())
}

fn text_arg<'a>(ctx: &'a Context<'_>, idx: usize, name: &'static str) -> ExtensionResult<&'a str> {
    ctx.get_raw(idx)
        .as_str()
        .map_err(|e| ExtensionError::InvalidArgument {
            name,
            reason: e.to_string(),
        })
}

/// Optional positive result count. A missing or NULL argument means the
/// engine default.
fn top_k_arg(ctx: &Context<'_>, idx: usize) -> ExtensionResult<Option<usize>> {
    if idx >= ctx.len() {
        return Ok(None);
    }
    match ctx.get_raw(idx) {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(k) if k > 0 => Ok(usize::try_from(k).ok()),
        ValueRef::Integer(k) => Err(VectorError::InvalidTopK(k).into()),
        other => Err(ExtensionError::InvalidArgument {
            name: "top_k",
            reason: format!("expected an integer, got {}", other.data_type()),
        }),
    }
}

fn into_sql_error(err: ExtensionError) -> rusqlite::Error {
    match err {
        ExtensionError::Storage(crate::storage::StorageError::Sqlite(inner)) => inner,
        other => rusqlite::Error::UserFunctionError(Box::new(other)),
    }
}

fn sqlite_error(err: rusqlite::Error) -> ExtensionError {
    ExtensionError::Storage(err.into())
}

fn json_error(err: serde_json::Error) -> ExtensionError {
    ExtensionError::InvalidArgument {
        name: "result",
        reason: err.to_string(),
    }
}
