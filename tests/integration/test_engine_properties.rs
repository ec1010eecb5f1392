//! Search behavior checked against brute force on generated data.

use std::sync::Arc;

use semsql::vector::squared_l2;
use semsql::{
    BuildOutcome, ChunkId, ExtensionError, IndexStatus, VectorDimension, VectorError,
    VectorSearchEngine,
};

use crate::common::{KeywordEncoder, pseudo_random_vectors};

fn engine_with(vectors: &[Vec<f32>]) -> VectorSearchEngine {
    let dimension = VectorDimension::new(vectors[0].len()).unwrap();
    let engine = VectorSearchEngine::new(dimension);
    let rows: Vec<(ChunkId, Vec<f32>)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (ChunkId::new(i as i64 * 10), v.clone()))
        .collect();
    engine.build_from_vectors(&rows).unwrap();
    engine
}

fn brute_force(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<ChunkId> {
    let mut scored: Vec<(f32, usize)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (squared_l2(v, query), i))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(k)
        .map(|(_, i)| ChunkId::new(i as i64 * 10))
        .collect()
}

#[test]
fn test_stats_count_matches_loaded_vectors() {
    for count in [1, 2, 17, 250] {
        let engine = engine_with(&pseudo_random_vectors(count, 8, count as u64));
        match engine.status() {
            IndexStatus::Built(stats) => {
                assert_eq!(stats.vectors, count);
                assert_eq!(stats.dimension, 8);
            }
            IndexStatus::NotBuilt => panic!("index should be built"),
        }
    }
}

#[test]
fn test_every_indexed_vector_finds_itself() {
    let vectors = pseudo_random_vectors(64, 16, 7);
    let engine = engine_with(&vectors);

    for (i, vector) in vectors.iter().enumerate() {
        let hits = engine.search_by_vector(vector, Some(1)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, ChunkId::new(i as i64 * 10));
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[0].similarity_score, 1.0);
    }
}

#[test]
fn test_k_above_count_returns_everything() {
    let vectors = pseudo_random_vectors(9, 4, 3);
    let engine = engine_with(&vectors);
    let hits = engine.search_by_vector(&vectors[0], Some(1000)).unwrap();
    assert_eq!(hits.len(), 9);
}

#[test]
fn test_matches_brute_force_ranking() {
    let vectors = pseudo_random_vectors(300, 12, 42);
    let engine = engine_with(&vectors);
    let queries = pseudo_random_vectors(10, 12, 4242);

    for query in &queries {
        let expected = brute_force(&vectors, query, 10);
        let hits = engine.search_by_vector(query, Some(10)).unwrap();
        let actual: Vec<ChunkId> = hits.iter().map(|h| h.chunk_id).collect();
        assert_eq!(actual, expected);

        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
            assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
    }
}

#[test]
fn test_large_index_matches_brute_force() {
    // Enough vectors to take the parallel scan
    let vectors = pseudo_random_vectors(5000, 8, 99);
    let engine = engine_with(&vectors);
    let query = &pseudo_random_vectors(1, 8, 100)[0];

    let expected = brute_force(&vectors, query, 25);
    let actual: Vec<ChunkId> = engine
        .search_by_vector(query, Some(25))
        .unwrap()
        .iter()
        .map(|h| h.chunk_id)
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_duplicate_vectors_rank_by_insertion_order() {
    let vectors = vec![vec![1.0, 1.0], vec![5.0, 5.0], vec![1.0, 1.0], vec![1.0, 1.0]];
    let engine = engine_with(&vectors);
    let hits = engine.search_by_vector(&[1.0, 1.0], Some(3)).unwrap();
    let ids: Vec<i64> = hits.iter().map(|h| h.chunk_id.get()).collect();
    assert_eq!(ids, vec![0, 20, 30]);
}

#[test]
fn test_search_before_build_fails_on_every_path() {
    let engine = VectorSearchEngine::new(VectorDimension::new(3).unwrap())
        .with_encoder(KeywordEncoder::new(3));

    let not_built = |result: Result<_, ExtensionError>| {
        matches!(result, Err(ExtensionError::Vector(VectorError::IndexNotBuilt)))
    };
    assert!(not_built(engine.search_by_text("alpha", None)));
    assert!(not_built(engine.search_by_vector(&[0.0, 0.0, 0.0], None)));
    assert!(not_built(engine.search_by_blob(&[0u8; 12], None)));
    assert!(not_built(engine.search_by_chunk(ChunkId::new(1), None)));
}

#[test]
fn test_encoding_is_deterministic() {
    let engine = VectorSearchEngine::new(VectorDimension::dimension_384());
    let first = engine.encode_text("deterministic text").unwrap();
    let second = engine.encode_text("deterministic text").unwrap();
    assert_eq!(first.len(), 384);
    assert_eq!(first, second);
    assert_ne!(first, engine.encode_text("other text").unwrap());
}

#[test]
fn test_worked_example() {
    let engine = VectorSearchEngine::new(VectorDimension::new(2).unwrap());
    let outcome = engine
        .build_from_vectors(&[
            (ChunkId::new(1), vec![0.0, 0.0]),
            (ChunkId::new(2), vec![3.0, 4.0]),
            (ChunkId::new(3), vec![1.0, 1.0]),
        ])
        .unwrap();
    assert!(matches!(outcome, BuildOutcome::Built(_)));

    let hits = engine.search_by_vector(&[0.0, 0.0], Some(2)).unwrap();
    let json = serde_json::to_value(&hits).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"rank": 1, "chunk_id": 1, "distance": 0.0, "similarity_score": 1.0},
            {"rank": 2, "chunk_id": 3, "distance": 2.0, "similarity_score": 0.3333}
        ])
    );
}

#[test]
fn test_concurrent_searches_during_rebuild() {
    let vectors = pseudo_random_vectors(500, 8, 5);
    let engine = Arc::new(engine_with(&vectors));
    let query = vectors[17].clone();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let query = query.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let hits = engine.search_by_vector(&query, Some(3)).unwrap();
                    // Every snapshot holds vector 17 under the same id
                    assert_eq!(hits[0].chunk_id, ChunkId::new(170));
                    assert_eq!(hits.len(), 3);
                }
            })
        })
        .collect();

    for seed in 0..5 {
        let mut rebuilt = pseudo_random_vectors(500, 8, 1000 + seed);
        rebuilt[17] = query.clone();
        let rows: Vec<(ChunkId, Vec<f32>)> = rebuilt
            .into_iter()
            .enumerate()
            .map(|(i, v)| (ChunkId::new(i as i64 * 10), v))
            .collect();
        engine.build_from_vectors(&rows).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
}
