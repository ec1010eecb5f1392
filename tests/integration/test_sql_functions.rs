//! End-to-end tests of the SQL functions against an on-disk database.

use std::sync::Arc;

use rusqlite::{Connection, params};
use semsql::config::{SourceConfig, SqlConfig};
use semsql::vector::blob::{decode_f32_blob, encode_f32_blob};
use semsql::{VectorDimension, VectorSearchEngine, register_functions};
use serde_json::Value;

use crate::common::{KeywordEncoder, TestDatabase};

fn keyword_engine(dimension: usize) -> Arc<VectorSearchEngine> {
    Arc::new(
        VectorSearchEngine::new(VectorDimension::new(dimension).unwrap())
            .with_encoder(KeywordEncoder::new(dimension)),
    )
}

fn register(conn: &Connection, engine: &Arc<VectorSearchEngine>, source: &SourceConfig) {
    register_functions(conn, Arc::clone(engine), &SqlConfig::default(), source).unwrap();
}

fn json(conn: &Connection, sql: &str) -> Value {
    let text: String = conn.query_row(sql, [], |row| row.get(0)).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn seeded_database() -> TestDatabase {
    let db = TestDatabase::new();
    db.insert(10, "alpha notes", &[1.0, 0.0, 0.0]);
    db.insert(20, "beta notes", &[0.0, 1.0, 0.0]);
    db.insert(30, "gamma notes", &[0.0, 0.0, 1.0]);
    db.insert(40, "alpha and beta", &[0.7, 0.7, 0.0]);
    db
}

#[test]
fn test_build_reports_loaded_and_skipped_rows() {
    let db = seeded_database();
    db.insert_raw(50, "no embedding yet", None);
    db.insert_raw(60, "truncated", Some(vec![0u8; 10]));

    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &db.source);

    let status = json(&conn, "SELECT vec_build_index()");
    assert_eq!(status["status"], "success");
    assert_eq!(status["vectors_loaded"], 4);
    assert_eq!(status["dimension"], 3);
    assert_eq!(status["index_type"], "FlatL2");
    // NULL rows never leave the query; only the truncated blob is counted
    assert_eq!(status["skipped_rows"], 1);

    let stats = json(&conn, "SELECT vec_index_stats()");
    assert_eq!(stats["vectors"], 4);
}

#[test]
fn test_text_search_ranks_by_distance() {
    let db = seeded_database();
    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &db.source);
    json(&conn, "SELECT vec_build_index()");

    let hits = json(&conn, "SELECT vec_search('beta', 2)");
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["rank"], 1);
    assert_eq!(hits[0]["chunk_id"], 20);
    assert_eq!(hits[0]["distance"], 0.0);
    assert_eq!(hits[0]["similarity_score"], 1.0);
    assert_eq!(hits[1]["rank"], 2);
    assert_eq!(hits[1]["chunk_id"], 40);
}

#[test]
fn test_results_join_back_to_source_rows() {
    let db = seeded_database();
    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &db.source);
    json(&conn, "SELECT vec_build_index()");

    let hits = json(&conn, "SELECT vec_search('gamma', 1)");
    let chunk_id = hits[0]["chunk_id"].as_i64().unwrap();
    let content: String = conn
        .query_row(
            "SELECT content FROM text_chunks_v2 WHERE id = ?1",
            params![chunk_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(content, "gamma notes");
}

#[test]
fn test_search_vector_with_stored_embedding() {
    let db = seeded_database();
    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &db.source);
    json(&conn, "SELECT vec_build_index()");

    let hits: String = conn
        .query_row(
            "SELECT vec_search_vector((SELECT embedding FROM text_chunks_v2 WHERE id = 40), 1)",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let hits: Value = serde_json::from_str(&hits).unwrap();
    assert_eq!(hits[0]["chunk_id"], 40);
    assert_eq!(hits[0]["distance"], 0.0);
}

#[test]
fn test_search_vector_rejects_wrong_size_blob() {
    let db = seeded_database();
    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &db.source);
    json(&conn, "SELECT vec_build_index()");

    let err = conn
        .query_row(
            "SELECT vec_search_vector(?1)",
            params![encode_f32_blob(&[1.0, 0.0])],
            |row| row.get::<_, String>(0),
        )
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Invalid embedding size"), "{message}");
    assert!(message.contains("12"), "{message}");
}

#[test]
fn test_index_is_shared_between_connections() {
    let db = seeded_database();
    let engine = keyword_engine(3);

    let writer = db.connection();
    register(&writer, &engine, &db.source);
    json(&writer, "SELECT vec_build_index()");

    let reader = db.connection();
    register(&reader, &engine, &db.source);
    let hits = json(&reader, "SELECT vec_search('alpha', 1)");
    assert_eq!(hits[0]["chunk_id"], 10);
}

#[test]
fn test_rebuild_picks_up_new_rows() {
    let db = seeded_database();
    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &db.source);
    json(&conn, "SELECT vec_build_index()");

    db.insert(5, "second gamma", &[0.0, 0.0, 1.0]);
    let status = json(&conn, "SELECT vec_build_index()");
    assert_eq!(status["vectors_loaded"], 5);

    // Equal distances keep ascending id order
    let hits = json(&conn, "SELECT vec_search('gamma', 2)");
    assert_eq!(hits[0]["chunk_id"], 5);
    assert_eq!(hits[1]["chunk_id"], 30);
}

#[test]
fn test_empty_table_keeps_previous_index() {
    let db = seeded_database();
    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &db.source);
    json(&conn, "SELECT vec_build_index()");

    conn.execute("DELETE FROM text_chunks_v2", []).unwrap();
    let status = json(&conn, "SELECT vec_build_index()");
    assert_eq!(status["status"], "error");
    assert_eq!(status["message"], "No embeddings found");

    let stats = json(&conn, "SELECT vec_index_stats()");
    assert_eq!(stats["vectors"], 4);
}

#[test]
fn test_custom_source_layout() {
    let source = SourceConfig {
        table: "passages".to_string(),
        id_column: "passage_id".to_string(),
        embedding_column: "vec".to_string(),
    };
    let db = TestDatabase::with_source(source.clone());
    db.insert(1, "alpha", &[1.0, 0.0, 0.0]);
    db.insert(2, "beta", &[0.0, 1.0, 0.0]);

    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &source);

    assert_eq!(json(&conn, "SELECT vec_build_index()")["vectors_loaded"], 2);
    assert_eq!(json(&conn, "SELECT vec_search('beta', 1)")[0]["chunk_id"], 2);
}

#[test]
fn test_encode_then_search_with_hash_encoder() {
    let db = TestDatabase::new();
    let engine = Arc::new(VectorSearchEngine::new(VectorDimension::dimension_384()));
    let texts = ["connection pooling", "retry with backoff", "lexer state machine"];
    for (id, text) in (1i64..).zip(texts) {
        let embedding = engine.encode_text(text).unwrap();
        db.insert(id, text, &embedding);
    }

    let conn = db.connection();
    register(&conn, &engine, &db.source);
    assert_eq!(json(&conn, "SELECT vec_build_index()")["dimension"], 384);

    let blob: Vec<u8> = conn
        .query_row("SELECT vec_encode_text('retry with backoff')", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(blob.len(), 384 * 4);
    let decoded = decode_f32_blob(&blob, VectorDimension::dimension_384()).unwrap();
    assert!(decoded.iter().all(|v| (0.0..1.0).contains(v)));

    let hits = json(&conn, "SELECT vec_search('retry with backoff', 3)");
    assert_eq!(hits[0]["chunk_id"], 2);
    assert_eq!(hits[0]["distance"], 0.0);
    assert_eq!(hits.as_array().unwrap().len(), 3);
}

#[test]
fn test_functions_compose_in_one_statement() {
    let db = seeded_database();
    let conn = db.connection();
    let engine = keyword_engine(3);
    register(&conn, &engine, &db.source);

    let (status, stats): (String, String) = conn
        .query_row("SELECT vec_build_index(), vec_index_stats()", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert!(status.contains("success"));
    assert!(stats.contains("\"vectors\":4"));
}
