//! End-to-end scenarios exercising more than one component together.
//! Component-local behavior is covered by each module's own unit tests;
//! these confirm the pieces compose the way the contract promises.

use std::sync::Arc;

use hybridex::bm25::{Bm25Doc, Bm25Index, Bm25Store};
use hybridex::config::VectorConfig;
use hybridex::model::{CheckpointStage, Chunk, ChunkEmbedding, ContentType, FileRecord, IndexCheckpoint, Project};
use hybridex::search::{Bm25Searcher, DeterministicEmbedder, Embedder, RrfFusion, Searcher, VectorSearcher};
use hybridex::store::MetadataStore;
use hybridex::vector::VectorStore;

fn bm25_doc(id: &str, content: &str) -> Bm25Doc {
    Bm25Doc { id: id.to_string(), content: content.to_string() }
}

// S1 — BM25 ranking.
#[test]
fn s1_bm25_ranking() {
    let store = Bm25Store::open(&tempfile::tempdir().unwrap().path().join("bm25.db")).unwrap();
    store
        .index(&[
            bm25_doc("1", "func getUserById"),
            bm25_doc("2", "func createUser"),
            bm25_doc("3", "func deleteUser"),
        ])
        .unwrap();

    let hits = store.search("user", 10).unwrap();
    assert_eq!(hits.len(), 3);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for hit in &hits {
        assert!(hit.score > 0.0);
    }

    let hits = store.search("getUserById", 10).unwrap();
    assert_eq!(hits[0].id, "1");
}

// S2 — camel/snake tokenization convergence.
#[test]
fn s2_camel_and_snake_case_converge() {
    let store = Bm25Store::open(&tempfile::tempdir().unwrap().path().join("bm25.db")).unwrap();
    store.index(&[bm25_doc("1", "def get_user_by_id")]).unwrap();
    let hits = store.search("user", 10).unwrap();
    assert_eq!(hits[0].id, "1");
}

// S3 — vector top-1 with cosine metric.
#[test]
fn s3_vector_top1_cosine() {
    let store = VectorStore::new(VectorConfig::new(4), 8);
    store
        .add(
            &["a".to_string(), "b".to_string(), "c".to_string()],
            &[vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0], vec![0.9, 0.1, 0.0, 0.0]],
        )
        .unwrap();

    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "a");
    assert_eq!(hits[1].id, "c");
    assert!(hits[0].score > 0.99);
}

// S4 — vector update replaces in place and lazily orphans the old key.
#[test]
fn s4_vector_update_lazily_orphans() {
    let store = VectorStore::new(VectorConfig::new(4), 8);
    store.add(&["a".to_string()], &[vec![1.0, 0.0, 0.0, 0.0]]).unwrap();
    store.add(&["a".to_string()], &[vec![0.0, 1.0, 0.0, 0.0]]).unwrap();

    assert_eq!(store.count(), 1);
    let hits = store.search(&[0.0, 1.0, 0.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].id, "a");
    assert!(hits[0].score > 0.99);
    assert!(store.stats().orphans >= 1);
}

// S5 — metadata persistence across a close/reopen cycle, and vector
// persistence across a save/load cycle.
#[test]
fn s5_metadata_and_vector_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("metadata.db");

    let project = Project {
        id: "proj-1".to_string(),
        name: "demo".to_string(),
        root_path: "/repo".to_string(),
        project_type: "rust".to_string(),
        file_count: 0,
        chunk_count: 0,
        indexed_at: 0,
        version: "1".to_string(),
    };
    let file = FileRecord {
        id: "file-1".to_string(),
        project_id: "proj-1".to_string(),
        path: "src/lib.rs".to_string(),
        size: 10,
        mod_time: 0,
        content_hash: "hash".to_string(),
        language: "rust".to_string(),
        content_type: ContentType::Code,
        indexed_at: 0,
    };

    {
        let store = MetadataStore::open(&db_path).unwrap();
        store.save_project(&project).unwrap();
        store.save_files(&[file.clone()]).unwrap();

        let chunks: Vec<Chunk> = (0..1000)
            .map(|i| Chunk {
                id: format!("chunk-{i}"),
                file_id: "file-1".to_string(),
                file_path: "src/lib.rs".to_string(),
                content: format!("fn f{i}() {{}}"),
                raw_content: format!("fn f{i}() {{}}"),
                context: String::new(),
                content_type: ContentType::Code,
                language: "rust".to_string(),
                start_line: i as u32,
                end_line: i as u32,
                symbols: Vec::new(),
                metadata: Default::default(),
                embedding: None,
                created_at: 0,
                updated_at: 0,
            })
            .collect();
        store.save_chunks(&chunks).unwrap();
        store.checkpoint().unwrap();
    }

    let store = MetadataStore::open(&db_path).unwrap();
    let chunks = store.get_chunks_by_file("file-1").unwrap();
    assert_eq!(chunks.len(), 1000);
    assert!(chunks.iter().all(|c| c.content.starts_with("fn f")));

    let vector_dir = dir.path().join("vectors");
    std::fs::create_dir_all(&vector_dir).unwrap();
    let embedder = DeterministicEmbedder::new(768, "test-model");
    let vector = embedder.embed("fn f0() {}");
    {
        let vstore = VectorStore::new(VectorConfig::new(768), 4);
        vstore.add(&["chunk-0".to_string()], &[vector.clone()]).unwrap();
        vstore.save(&vector_dir, "hnsw").unwrap();
    }
    let loaded = VectorStore::load(&vector_dir, "hnsw").unwrap();
    let hits = loaded.search(&vector, 1).unwrap();
    assert_eq!(hits[0].id, "chunk-0");
    assert!(hits[0].score > 0.99);
}

// S6 — BM25 corruption auto-recovery.
#[test]
fn s6_bm25_corruption_auto_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bm25.db");
    std::fs::write(&path, [0u8; 64]).unwrap();

    let store = Bm25Store::open(&path).unwrap();
    assert_eq!(store.stats().unwrap().document_count, 0);
    store.index(&[bm25_doc("1", "recovery")]).unwrap();
    assert_eq!(store.search("recovery", 10).unwrap()[0].id, "1");
}

// S7 — checkpoint resume.
#[test]
fn s7_checkpoint_resume() {
    let store = MetadataStore::open_in_memory().unwrap();
    store
        .save_index_checkpoint(&IndexCheckpoint {
            stage: CheckpointStage::Embedding,
            total: 100,
            embedded_count: 50,
            timestamp: 0,
            embedder_model: "m".to_string(),
        })
        .unwrap();

    let checkpoint = store.load_index_checkpoint().unwrap().unwrap();
    assert_eq!(checkpoint.total, 100);
    assert_eq!(checkpoint.embedded_count, 50);

    store
        .save_index_checkpoint(&IndexCheckpoint {
            stage: CheckpointStage::Complete,
            total: 100,
            embedded_count: 100,
            timestamp: 0,
            embedder_model: "m".to_string(),
        })
        .unwrap();
    assert!(store.load_index_checkpoint().unwrap().is_none());
}

// S8 — fusion tie-break by lexicographic ID under equal weights.
#[test]
fn s8_fusion_ties_break_lexicographically() {
    struct Fixed(Vec<&'static str>);
    impl Searcher for Fixed {
        fn search(&self, _query: &str, limit: usize) -> Result<Vec<hybridex::search::SearchHit>, hybridex::search::SearchError> {
            Ok(self
                .0
                .iter()
                .take(limit)
                .map(|id| hybridex::search::SearchHit { id: id.to_string(), score: 0.0, matched_terms: Vec::new() })
                .collect())
        }
    }

    let fusion = RrfFusion::new(vec![
        (Box::new(Fixed(vec!["x", "y", "z"])) as Box<dyn Searcher>, 0.5),
        (Box::new(Fixed(vec!["z", "y", "x"])) as Box<dyn Searcher>, 0.5),
    ]);

    let fused = fusion.search("q", 10).unwrap();
    let x = fused.iter().find(|h| h.id == "x").unwrap();
    let z = fused.iter().find(|h| h.id == "z").unwrap();
    assert!((x.score - z.score).abs() < 1e-6);

    let x_idx = fused.iter().position(|h| h.id == "x").unwrap();
    let z_idx = fused.iter().position(|h| h.id == "z").unwrap();
    assert!(x_idx < z_idx, "tie should break lexicographically (x before z)");
}

// Cascading delete: removing a file removes its chunks (invariant 9).
#[test]
fn cascading_delete_removes_chunks() {
    let store = MetadataStore::open_in_memory().unwrap();
    let project = Project {
        id: "p".to_string(),
        name: "p".to_string(),
        root_path: "/r".to_string(),
        project_type: "rust".to_string(),
        file_count: 0,
        chunk_count: 0,
        indexed_at: 0,
        version: "1".to_string(),
    };
    store.save_project(&project).unwrap();
    store
        .save_files(&[FileRecord {
            id: "f".to_string(),
            project_id: "p".to_string(),
            path: "a.rs".to_string(),
            size: 1,
            mod_time: 0,
            content_hash: "h".to_string(),
            language: "rust".to_string(),
            content_type: ContentType::Code,
            indexed_at: 0,
        }])
        .unwrap();
    store
        .save_chunks(&[Chunk {
            id: "c".to_string(),
            file_id: "f".to_string(),
            file_path: "a.rs".to_string(),
            content: "fn a() {}".to_string(),
            raw_content: "fn a() {}".to_string(),
            context: String::new(),
            content_type: ContentType::Code,
            language: "rust".to_string(),
            start_line: 1,
            end_line: 1,
            symbols: Vec::new(),
            metadata: Default::default(),
            embedding: None,
            created_at: 0,
            updated_at: 0,
        }])
        .unwrap();

    store.delete_file("p", "a.rs").unwrap();
    assert!(store.get_chunks_by_file("f").unwrap().is_empty());
}

// Hybrid query flow: bm25 + vector searchers fused by RRF find a chunk that
// only one of the two signals ranks highly.
#[test]
fn hybrid_search_fuses_lexical_and_semantic_signals() {
    let bm25 = Arc::new(Bm25Store::open(&tempfile::tempdir().unwrap().path().join("bm25.db")).unwrap());
    bm25.index(&[bm25_doc("auth", "fn authenticate_user(token: &str) -> bool")]).unwrap();
    bm25.index(&[bm25_doc("parse", "fn parse_config(path: &Path) -> Config")]).unwrap();

    // The deterministic embedder carries no real semantics — it hashes raw
    // text — so to exercise the fusion plumbing rather than embedding
    // quality, store "auth"'s vector as what the query will itself embed to.
    let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder::new(16, "test"));
    let query_vector = embedder.embed(&embedder.format_query("authenticate user"));
    let vectors = Arc::new(VectorStore::new(VectorConfig::new(16), 4));
    vectors.add(&["auth".to_string()], &[query_vector]).unwrap();
    vectors.add(&["parse".to_string()], &[embedder.embed("parse_config")]).unwrap();

    let bm25_searcher = Bm25Searcher::new(bm25);
    let vector_searcher = VectorSearcher::new(vectors, embedder);

    let fusion = RrfFusion::new(vec![
        (Box::new(bm25_searcher) as Box<dyn Searcher>, 0.35),
        (Box::new(vector_searcher) as Box<dyn Searcher>, 0.65),
    ]);

    let hits = fusion.search("authenticate user", 5).unwrap();
    assert_eq!(hits[0].id, "auth");
}

#[test]
fn embedding_round_trips_through_chunk_embedding() {
    let embedding = ChunkEmbedding { model: "test-model".to_string(), vector: vec![0.1, 0.2, 0.3] };
    assert_eq!(embedding.vector.len(), 3);
}
