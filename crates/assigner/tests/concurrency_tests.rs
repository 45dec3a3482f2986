//! Concurrency and thread safety tests for the assignment pipeline: the
//! shared index and engines must serve parallel callers without corrupting
//! results or diverging from sequential output.

use std::sync::Arc;
use std::thread;

use assigner::{AssignConfig, Assigner, ProvidedScores};
use embedding::{EmbeddingConfig, EmbeddingEngine, TextRecord};
use rationale::{RationaleConfig, RationaleExtractor};
use refindex::{IndexConfig, ReferenceEntry, ReferenceIndex};

fn test_record(id: &str) -> TextRecord {
    TextRecord::new(
        id,
        format!("Concurrent submission {id}"),
        format!("Abstract text for concurrent submission {id}."),
    )
}

fn shared_index(engine: &EmbeddingEngine) -> Arc<ReferenceIndex> {
    let mut entries = Vec::new();
    for (conference, n) in [("CVPR", 4), ("EMNLP", 4), ("KDD", 4)] {
        for i in 0..n {
            let record = TextRecord::new(
                format!("ref-{conference}-{i}"),
                format!("Reference {i} on {conference} topics"),
                format!("Reference abstract {i} aligned with {conference}."),
            );
            let emb = engine.embed(&record).expect("reference embedding");
            entries.push(ReferenceEntry::new(conference, emb.vector, record.id));
        }
    }
    Arc::new(ReferenceIndex::build(entries, IndexConfig::new()).expect("index build"))
}

fn shared_assigner() -> Arc<Assigner> {
    let engine = Arc::new(EmbeddingEngine::new(EmbeddingConfig::stub()).expect("stub engine"));
    let index = shared_index(&engine);
    Arc::new(
        Assigner::new(
            Arc::new(ProvidedScores::uniform(0.9)),
            engine,
            index,
            Arc::new(RationaleExtractor::new(RationaleConfig::stub()).expect("stub extractor")),
            AssignConfig {
                k: 5,
                workers: 3,
                acceptance_threshold: 0.0,
                ..AssignConfig::default()
            },
        )
        .expect("assigner"),
    )
}

#[test]
fn concurrent_queries_return_consistent_results() {
    let engine = EmbeddingEngine::new(EmbeddingConfig::stub()).expect("stub engine");
    let index = shared_index(&engine);
    let query = engine
        .embed(&test_record("query"))
        .expect("query embedding");

    let baseline = index.query(&query.vector, 5).expect("baseline query");

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let index = Arc::clone(&index);
            let vector = query.vector.clone();
            thread::spawn(move || index.query(&vector, 5).expect("concurrent query"))
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let hits = handle.join().expect("query thread");
        assert_eq!(hits, baseline, "thread {i} saw different neighbors");
    }
}

#[test]
fn concurrent_assignments_match_sequential() {
    let assigner = shared_assigner();
    let records: Vec<TextRecord> = (0..8).map(|i| test_record(&format!("p{i}"))).collect();

    let sequential: Vec<_> = records
        .iter()
        .map(|r| assigner.assign(r).expect("sequential assign"))
        .collect();

    let handles: Vec<_> = records
        .into_iter()
        .map(|record| {
            let assigner = Arc::clone(&assigner);
            thread::spawn(move || assigner.assign(&record).expect("concurrent assign"))
        })
        .collect();

    for (expected, handle) in sequential.into_iter().zip(handles) {
        let decision = handle.join().expect("assign thread");
        assert_eq!(decision, expected);
    }
}

#[test]
fn concurrent_same_record_is_idempotent() {
    let assigner = shared_assigner();
    let baseline = assigner.assign(&test_record("same")).expect("baseline");

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let assigner = Arc::clone(&assigner);
            thread::spawn(move || assigner.assign(&test_record("same")).expect("assign"))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("assign thread"), baseline);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bounded_batch_matches_unbounded_results() {
    let assigner = shared_assigner();
    let records: Vec<TextRecord> = (0..12).map(|i| test_record(&format!("p{i}"))).collect();

    let sequential: Vec<_> = records
        .iter()
        .map(|r| assigner.assign(r).expect("sequential assign"))
        .collect();

    // The worker cap bounds in-flight records; it must not change results
    // or their order.
    let batched = assigner.assign_batch(records).await.expect("batch");
    assert_eq!(batched, sequential);
}
