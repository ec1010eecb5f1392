//! Loading embeddings from a row source.
//!
//! Loading is permissive: rows whose payload is NULL or not exactly
//! `dimension * 4` bytes are skipped and counted, never reported as errors.
//! So are rows whose id cell cannot be read as an integer.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::storage::{StorageError, StorageResult};
use crate::vector::blob::extend_from_blob;
use crate::vector::{ChunkId, VectorDimension};

/// One row as delivered by a source, before validation.
#[derive(Debug, Clone, Copy)]
pub struct RawEmbeddingRow<'a> {
    /// `None` when the id cell holds no integer value.
    pub id: Option<ChunkId>,
    pub payload: Option<&'a [u8]>,
}

/// Anything that can stream `(id, embedding blob)` rows in ascending id order.
pub trait EmbeddingSource {
    fn for_each_row(&self, visit: &mut dyn FnMut(RawEmbeddingRow<'_>)) -> StorageResult<()>;
}

impl EmbeddingSource for [(i64, Option<Vec<u8>>)] {
    fn for_each_row(&self, visit: &mut dyn FnMut(RawEmbeddingRow<'_>)) -> StorageResult<()> {
        for (id, payload) in self {
            visit(RawEmbeddingRow {
                id: Some(ChunkId::new(*id)),
                payload: payload.as_deref(),
            });
        }
        Ok(())
    }
}

impl EmbeddingSource for Vec<(i64, Option<Vec<u8>>)> {
    fn for_each_row(&self, visit: &mut dyn FnMut(RawEmbeddingRow<'_>)) -> StorageResult<()> {
        self.as_slice().for_each_row(visit)
    }
}

/// Vectors accepted by a load, packed contiguously, with their ids in lockstep.
#[derive(Debug, Clone)]
pub struct LoadedEmbeddings {
    pub dimension: VectorDimension,
    pub data: Vec<f32>,
    pub chunk_ids: Vec<ChunkId>,
    pub skipped_rows: usize,
}

impl LoadedEmbeddings {
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunk_ids.len()
    }

    /// True when no row passed the size filter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }
}

/// Reads every row from `source`, keeping the well-formed ones.
pub fn load_embeddings<S>(source: &S, dimension: VectorDimension) -> StorageResult<LoadedEmbeddings>
where
    S: EmbeddingSource + ?Sized,
{
    let expected = dimension.blob_len();
    let mut loaded = LoadedEmbeddings {
        dimension,
        data: Vec::new(),
        chunk_ids: Vec::new(),
        skipped_rows: 0,
    };

    source.for_each_row(&mut |row| match (row.id, row.payload) {
        (Some(id), Some(bytes)) if bytes.len() == expected => {
            extend_from_blob(&mut loaded.data, bytes);
            loaded.chunk_ids.push(id);
        }
        (None, _) => {
            debug!("skipping row without an integer id");
            loaded.skipped_rows += 1;
        }
        (Some(id), Some(bytes)) => {
            debug!(
                chunk_id = id.get(),
                size = bytes.len(),
                expected,
                "skipping embedding with unexpected size"
            );
            loaded.skipped_rows += 1;
        }
        (Some(id), None) => {
            debug!(chunk_id = id.get(), "skipping row without embedding");
            loaded.skipped_rows += 1;
        }
    })?;

    info!(
        loaded = loaded.len(),
        skipped = loaded.skipped_rows,
        dimension = dimension.get(),
        "loaded embeddings"
    );
    Ok(loaded)
}

/// Embedding rows stored in a SQLite table.
pub struct SqliteEmbeddingSource<'conn> {
    conn: &'conn Connection,
    table: String,
    id_column: String,
    embedding_column: String,
}

impl<'conn> SqliteEmbeddingSource<'conn> {
    /// Binds a source to `conn` using the table layout from `config`.
    ///
    /// Identifiers are validated because they are spliced into SQL text.
    pub fn new(conn: &'conn Connection, config: &SourceConfig) -> StorageResult<Self> {
        Ok(Self {
            conn,
            table: quote_identifier("table", &config.table)?,
            id_column: quote_identifier("id_column", &config.id_column)?,
            embedding_column: quote_identifier("embedding_column", &config.embedding_column)?,
        })
    }

    fn select_all_sql(&self) -> String {
        format!(
            "SELECT {id}, {emb} FROM {table} WHERE {emb} IS NOT NULL ORDER BY {id}",
            id = self.id_column,
            emb = self.embedding_column,
            table = self.table,
        )
    }
}

impl EmbeddingSource for SqliteEmbeddingSource<'_> {
    fn for_each_row(&self, visit: &mut dyn FnMut(RawEmbeddingRow<'_>)) -> StorageResult<()> {
        let mut stmt = self.conn.prepare(&self.select_all_sql())?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id = chunk_id_from_cell(row.get_ref(0)?);
            let payload = match row.get_ref(1)? {
                ValueRef::Blob(bytes) => Some(bytes),
                _ => None,
            };
            visit(RawEmbeddingRow { id, payload });
        }
        Ok(())
    }
}

/// Reads an id cell as an integer.
///
/// Whole-number reals and numeric text are accepted, the way SQLite's own
/// integer conversion reads them. Anything else yields `None`.
fn chunk_id_from_cell(cell: ValueRef<'_>) -> Option<ChunkId> {
    match cell {
        ValueRef::Integer(id) => Some(ChunkId::new(id)),
        ValueRef::Real(value)
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 =>
        {
            Some(ChunkId::new(value as i64))
        }
        ValueRef::Text(text) => std::str::from_utf8(text)
            .ok()
            .and_then(|text| text.trim().parse::<i64>().ok())
            .map(ChunkId::new),
        _ => None,
    }
}

/// Validates a plain SQL identifier and wraps it in double quotes.
fn quote_identifier(field: &'static str, value: &str) -> StorageResult<String> {
    let valid = !value.is_empty()
        && !value.starts_with(|c: char| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StorageError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(format!("\"{value}\""))
}
