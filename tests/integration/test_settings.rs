//! Settings files driving engine construction and function registration.

use std::sync::Arc;

use semsql::config::EncoderBackend;
use semsql::{ExtensionError, Settings, VectorSearchEngine, register_functions};
use tempfile::TempDir;

use crate::common::TestDatabase;

fn write_settings(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_settings_drive_prefix_source_and_dimension() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(
        &dir,
        r#"
[source]
table = "passages"
id_column = "pid"
embedding_column = "emb"

[index]
dimension = 2
default_top_k = 1

[sql]
function_prefix = "faiss"
"#,
    );
    let settings = Settings::load_from(&path).unwrap();

    let db = TestDatabase::with_source(settings.source.clone());
    db.insert(1, "first", &[0.0, 0.0]);
    db.insert(2, "second", &[3.0, 4.0]);
    db.insert(3, "third", &[1.0, 1.0]);

    let conn = db.connection();
    let engine = Arc::new(VectorSearchEngine::from_settings(&settings).unwrap());
    register_functions(&conn, Arc::clone(&engine), &settings.sql, &settings.source).unwrap();

    let status: String = conn
        .query_row("SELECT faiss_build_index()", [], |row| row.get(0))
        .unwrap();
    assert!(status.contains("\"vectors_loaded\":3"));

    let hits = engine.search_by_vector(&[0.9, 0.9], None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id.get(), 3);

    assert!(conn
        .query_row("SELECT vec_index_stats()", [], |row| row.get::<_, String>(0))
        .is_err());
}

#[test]
fn test_unsafe_identifiers_are_rejected_at_registration() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, "[source]\ntable = \"chunks; DROP TABLE x\"\n");
    let settings = Settings::load_from(&path).unwrap();

    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let engine = Arc::new(VectorSearchEngine::from_settings(&settings).unwrap());
    assert!(matches!(
        register_functions(&conn, engine, &settings.sql, &settings.source),
        Err(ExtensionError::Storage(_))
    ));
}

#[test]
fn test_unknown_fastembed_model_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(
        &dir,
        "[encoder]\nbackend = \"fastembed\"\nmodel = \"NoSuchModel\"\n",
    );
    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.encoder.backend, EncoderBackend::FastEmbed);

    match VectorSearchEngine::from_settings(&settings) {
        Err(err @ ExtensionError::Config { .. }) => {
            assert_eq!(err.status_code(), "CONFIG_ERROR");
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn test_zero_top_k_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = write_settings(&dir, "[index]\ndefault_top_k = 0\n");
    assert!(Settings::load_from(&path).is_err());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load_from(dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings.index.dimension, 384);
    assert_eq!(settings.sql.function_prefix, "vec");
}
