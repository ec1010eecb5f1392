use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid SQL identifier for {field}: '{value}'. Use letters, digits and underscores only")]
    InvalidIdentifier { field: &'static str, value: String },
}

pub type StorageResult<T> = Result<T, StorageError>;
