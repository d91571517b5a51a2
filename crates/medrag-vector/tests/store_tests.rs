use medrag_core::similarity::cosine_similarity;
use medrag_core::traits::ChunkStore;
use medrag_core::types::Chunk;
use medrag_vector::LanceChunkStore;
use tempfile::TempDir;

fn chunk(doc: &str, idx: usize, embedding: Vec<f32>) -> Chunk {
    Chunk { document_name: doc.to_string(), chunk_index: idx, text: format!("{doc} window {idx}"), embedding }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("malaria.pdf", 0, vec![1.0, 0.0, 0.0, 0.0]),
        chunk("malaria.pdf", 1, vec![0.8, 0.6, 0.0, 0.0]),
        chunk("diabetes.pdf", 0, vec![0.0, 0.0, 1.0, 0.0]),
    ]
}

#[test]
fn lancedb_query_returns_nearest_first_with_cosine_distance() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceChunkStore::open(tmp.path(), "chunks_test", 4).expect("open");
    assert_eq!(store.upsert(&corpus()).expect("upsert"), 3);

    let query = vec![1.0, 0.1, 0.0, 0.0];
    let hits = store.query(&query, 2).expect("query");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "malaria.pdf_chunk_0");
    assert_eq!(hits[1].id, "malaria.pdf_chunk_1");
    assert!(hits[0].distance <= hits[1].distance);

    let expected = 1.0 - cosine_similarity(&query, &[1.0, 0.0, 0.0, 0.0]);
    assert!((hits[0].distance - expected).abs() < 1e-4, "distance={} expected={}", hits[0].distance, expected);
    assert_eq!(hits[0].document_name, "malaria.pdf");
    assert_eq!(hits[0].chunk_index, 0);
    assert_eq!(hits[0].text, "malaria.pdf window 0");
}

#[test]
fn lancedb_upsert_is_idempotent_per_chunk_identity() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceChunkStore::open(tmp.path(), "chunks_test", 4).expect("open");
    store.upsert(&corpus()).expect("first upsert");
    store.upsert(&corpus()).expect("second upsert");
    assert_eq!(store.count().expect("count"), 3);

    let mut changed = chunk("malaria.pdf", 0, vec![0.0, 0.0, 0.0, 1.0]);
    changed.text = "rewritten".to_string();
    store.upsert(&[changed]).expect("overwrite");
    assert_eq!(store.count().expect("count"), 3);
    let hits = store.query(&[0.0, 0.0, 0.0, 1.0], 1).expect("query");
    assert_eq!(hits[0].text, "rewritten");
}

#[test]
fn lancedb_empty_store_and_document_listing() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceChunkStore::open(tmp.path(), "chunks_test", 4).expect("open");
    assert!(store.query(&[1.0, 0.0, 0.0, 0.0], 5).expect("query").is_empty());
    assert!(store.document_names().expect("names").is_empty());

    store.upsert(&corpus()).expect("upsert");
    assert_eq!(store.document_names().expect("names"), vec!["diabetes.pdf", "malaria.pdf"]);

    store.reset().expect("reset");
    assert_eq!(store.count().expect("count"), 0);
}

#[test]
fn lancedb_persists_and_checks_dimension_on_reopen() {
    let tmp = TempDir::new().expect("tmp");
    {
        let store = LanceChunkStore::open(tmp.path(), "chunks_test", 4).expect("open");
        store.upsert(&corpus()).expect("upsert");
    }
    let reopened = LanceChunkStore::open(tmp.path(), "chunks_test", 4).expect("reopen");
    assert_eq!(reopened.count().expect("count"), 3);

    assert!(LanceChunkStore::open(tmp.path(), "chunks_test", 8).is_err());
    assert!(reopened.query(&[1.0, 0.0], 1).is_err());
    assert!(reopened.upsert(&[chunk("x.pdf", 0, vec![1.0])]).is_err());
}
