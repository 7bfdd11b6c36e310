use lgrep_store::{Chunk, ChunkStore};
use tempfile::tempdir;

fn sample_chunk(file_path: &str, index: u32, text: &str) -> Chunk {
    Chunk {
        id: Chunk::make_id(file_path, index),
        file_path: file_path.to_string(),
        chunk_index: index,
        start_line: 1,
        end_line: 5,
        text: text.to_string(),
        embedding: vec![0.1, 0.2, 0.3],
        file_hash: "deadbeef".to_string(),
        indexed_at_unix_ms: 0,
    }
}

#[test]
fn delete_by_file_with_injection_payload_only_deletes_matching_file() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();

    store
        .add(&[sample_chunk("safe.py", 0, "def safe(): pass")])
        .unwrap();
    store
        .add(&[sample_chunk("evil.py", 0, "def evil(): pass")])
        .unwrap();
    assert_eq!(store.count().unwrap(), 2);

    let deleted = store.delete_by_file("' OR '1'='1").unwrap();
    assert_eq!(deleted, 0, "injection payload must not match any real file_path");
    assert_eq!(store.count().unwrap(), 2, "unrelated rows must survive");

    let deleted = store.delete_by_file("safe.py").unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn add_then_delete_then_count_round_trips() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();

    assert_eq!(store.count().unwrap(), 0);
    store
        .add(&[
            sample_chunk("a.py", 0, "alpha"),
            sample_chunk("a.py", 1, "beta"),
        ])
        .unwrap();
    assert_eq!(store.count().unwrap(), 2);

    store.delete_by_file("a.py").unwrap();
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn upsert_replaces_existing_chunk_in_place() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();

    store.upsert(&[sample_chunk("a.py", 0, "old text")]).unwrap();
    store.upsert(&[sample_chunk("a.py", 0, "new text")]).unwrap();

    assert_eq!(store.count().unwrap(), 1, "same (file_path, chunk_index) must replace, not duplicate");
    assert_eq!(store.get_file_hash("a.py").unwrap(), Some("deadbeef".to_string()));
}

#[test]
fn get_indexed_files_lists_distinct_file_paths() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();

    store
        .add(&[
            sample_chunk("a.py", 0, "one"),
            sample_chunk("a.py", 1, "two"),
            sample_chunk("b.py", 0, "three"),
        ])
        .unwrap();

    let files = store.get_indexed_files().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.contains("a.py"));
    assert!(files.contains("b.py"));
}

#[test]
fn ensure_fts_index_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();
    store.add(&[sample_chunk("a.py", 0, "hello world")]).unwrap();

    assert!(store.ensure_fts_index());
    assert!(store.ensure_fts_index());
    assert_eq!(store.fts_build_count(), 1, "second call must be a no-op");
}

#[test]
fn clear_resets_index_flags_and_empties_store() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();
    store.add(&[sample_chunk("a.py", 0, "hello world")]).unwrap();
    store.ensure_fts_index();

    store.clear().unwrap();
    assert_eq!(store.count().unwrap(), 0);

    assert!(store.ensure_fts_index());
    assert_eq!(store.fts_build_count(), 1, "flag reset lets the index rebuild once more");
}

#[test]
fn search_vector_ranks_closest_embedding_first() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();

    let mut near = sample_chunk("near.py", 0, "near match");
    near.embedding = vec![1.0, 0.0, 0.0];
    let mut far = sample_chunk("far.py", 0, "far match");
    far.embedding = vec![0.0, 1.0, 0.0];
    store.add(&[near, far]).unwrap();

    let results = store.search_vector(&[1.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(results.results[0].file_path, "near.py");
    assert_eq!(results.total_chunks, 2);
}

#[test]
fn search_hybrid_fuses_vector_and_text_rankings() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();

    let mut a = sample_chunk("a.py", 0, "parses configuration files");
    a.embedding = vec![1.0, 0.0, 0.0];
    let mut b = sample_chunk("b.py", 0, "unrelated content about cats");
    b.embedding = vec![0.9, 0.1, 0.0];
    store.add(&[a, b]).unwrap();

    let results = store.search_hybrid(&[1.0, 0.0, 0.0], "configuration", 5).unwrap();
    assert!(!results.results.is_empty());
    assert_eq!(results.results[0].file_path, "a.py");
}

#[test]
fn chunks_added_after_the_first_hybrid_search_are_still_text_searchable() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();

    store.add(&[sample_chunk("a.py", 0, "parses configuration files")]).unwrap();
    // First hybrid search builds chunks_fts as a one-time snapshot.
    store.search_hybrid(&[1.0, 0.0, 0.0], "configuration", 5).unwrap();

    store.add(&[sample_chunk("b.py", 0, "parses configuration too")]).unwrap();
    let results = store.search_hybrid(&[1.0, 0.0, 0.0], "configuration", 5).unwrap();
    let paths: Vec<_> = results.results.iter().map(|r| r.file_path.as_str()).collect();
    assert!(
        paths.contains(&"b.py"),
        "a chunk indexed after the FTS snapshot was built must still be text-searchable"
    );
}

#[test]
fn reindexing_a_file_after_the_fts_snapshot_keeps_it_text_searchable() {
    let dir = tempdir().unwrap();
    let store = ChunkStore::open(dir.path()).unwrap();

    store.add(&[sample_chunk("a.py", 0, "parses configuration files")]).unwrap();
    store.search_hybrid(&[1.0, 0.0, 0.0], "configuration", 5).unwrap();

    // Mirrors index_file's delete-then-add re-index flow.
    store.delete_by_file("a.py").unwrap();
    store.add(&[sample_chunk("a.py", 0, "parses configuration files, updated")]).unwrap();

    let results = store.search_hybrid(&[1.0, 0.0, 0.0], "configuration", 5).unwrap();
    let paths: Vec<_> = results.results.iter().map(|r| r.file_path.as_str()).collect();
    assert!(
        paths.contains(&"a.py"),
        "a file re-indexed after the FTS snapshot was built must remain text-searchable"
    );
}

#[test]
fn reopening_a_corrupted_database_file_recovers_instead_of_failing() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(lgrep_store::STORE_FILE_NAME), b"not a sqlite file").unwrap();

    let store = ChunkStore::open(dir.path());
    assert!(store.is_ok(), "a corrupted cache file must be recoverable, not a hard failure");
    assert_eq!(store.unwrap().count().unwrap(), 0);
}
