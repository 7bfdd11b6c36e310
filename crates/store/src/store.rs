use crate::chunk::{decode_embedding, encode_embedding, Chunk};
use crate::error::{Result, StoreError};
use crate::escape::escape_sql_string;
use crate::fusion::{rrf_fuse, DEFAULT_RRF_K};
use rusqlite::{params, Connection};
use std::collections::{BinaryHeap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

pub const STORE_FILE_NAME: &str = "chunks.sqlite3";

/// Vector search only builds a (brute-force) index once the table exceeds
/// this many rows; smaller tables are scanned directly.
const VECTOR_INDEX_ROW_THRESHOLD: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchType {
    Vector,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub score: f64,
    pub match_type: MatchType,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
    pub query_time_ms: f64,
    pub total_chunks: u64,
}

/// Per-project persistent chunk store (§4.5). Owns one SQLite database
/// under the project's cache directory; the embedding column is stored
/// as a raw little-endian `f32` BLOB and searched by brute-force cosine
/// scan rather than a true ANN index — the contract only requires "lazy
/// index creation", not a specific algorithm, and a per-project store is
/// small enough that this is fast in practice.
pub struct ChunkStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    fts_ready: AtomicBool,
    vector_index_ready: AtomicBool,
    fts_build_count: AtomicUsize,
    vector_index_build_count: AtomicUsize,
}

impl std::fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStore").field("db_path", &self.db_path).finish()
    }
}

impl ChunkStore {
    /// Open (creating if absent) the store at `dir/chunks.sqlite3`,
    /// recovering from a corrupted cache directory or a corrupted table
    /// per §4.5's corruption-recovery rules.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join(STORE_FILE_NAME);

        let conn = match open_and_prepare(&db_path) {
            Ok(conn) => conn,
            Err(err) => {
                log::warn!(
                    "store at {db_path:?} unreadable ({err}); clearing cache directory and reconnecting once"
                );
                clear_dir_contents(dir)?;
                open_and_prepare(&db_path).map_err(|err| {
                    StoreError::Unrecoverable(format!(
                        "reconnect after clearing {dir:?} still failed: {err}"
                    ))
                })?
            }
        };

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            fts_ready: AtomicBool::new(false),
            vector_index_ready: AtomicBool::new(false),
            fts_build_count: AtomicUsize::new(0),
            vector_index_build_count: AtomicUsize::new(0),
        };
        store.ensure_chunks_table()?;
        Ok(store)
    }

    fn ensure_chunks_table(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        if let Err(err) = create_chunks_table(&conn) {
            log::warn!("chunks table unreadable ({err}), dropping and recreating");
            let _ = conn.execute("DROP TABLE IF EXISTS chunks", []);
            let _ = conn.execute("DROP TABLE IF EXISTS chunks_fts", []);
            create_chunks_table(&conn)?;
        }
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Append-only insert. Callers (the indexer) are expected to have
    /// already removed any chunks that would collide.
    pub fn add(&self, chunks: &[Chunk]) -> Result<()> {
        self.write_chunks(chunks, false)
    }

    /// Insert on absent id, replace all fields on collision.
    pub fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        self.write_chunks(chunks, true)
    }

    /// `chunks_fts` is a snapshot copy, not a live index over `chunks` —
    /// once `ensure_fts_index` has built it, every write here must also
    /// mirror the row into `chunks_fts` or full-text ranking silently
    /// stops seeing anything indexed after the first hybrid search.
    fn write_chunks(&self, chunks: &[Chunk], replace: bool) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let sync_fts = self.fts_ready.load(Ordering::Relaxed);
        for chunk in chunks {
            insert_chunk(&tx, chunk, replace)?;
            if sync_fts {
                sync_fts_row(&tx, chunk)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove every chunk whose `file_path` equals `path`. The predicate
    /// is built with the store's mandatory escaping rule rather than
    /// parameter binding, mirroring the raw-predicate-only interface this
    /// store's contract is modeled on — an injection payload must not
    /// touch unrelated rows (the Escape law, §8).
    pub fn delete_by_file(&self, path: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let predicate = format!("file_path = '{}'", escape_sql_string(path));
        let sql = format!("DELETE FROM chunks WHERE {predicate}");
        let deleted = conn.execute(&sql, [])?;
        if self.fts_ready.load(Ordering::Relaxed) {
            let fts_sql = format!("DELETE FROM chunks_fts WHERE file_path = '{}'", escape_sql_string(path));
            conn.execute(&fts_sql, []).ok();
        }
        Ok(deleted as u64)
    }

    pub fn get_file_hash(&self, path: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT file_hash FROM chunks WHERE file_path = ?1 LIMIT 1")?;
        let mut rows = stmt.query(params![path])?;
        Ok(match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        })
    }

    /// Project only `file_path` — never select `embedding`.
    pub fn get_indexed_files(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT file_path FROM chunks")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut files = HashSet::new();
        for row in rows {
            files.insert(row?);
        }
        Ok(files)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Wipe all chunks and reset both lazy-index flags — the only way
    /// they reset (§4.5).
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM chunks", [])?;
        conn.execute("DROP TABLE IF EXISTS chunks_fts", []).ok();
        self.fts_ready.store(false, Ordering::Relaxed);
        self.vector_index_ready.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Build the FTS5 index if it isn't already built this lifetime.
    /// Returns whether full-text search is available — `false` means the
    /// FTS5 module itself is unavailable and callers should degrade to
    /// vector-only search (§9 open question).
    pub fn ensure_fts_index(&self) -> bool {
        if self.fts_ready.load(Ordering::Relaxed) {
            return true;
        }
        let conn = self.conn.lock().unwrap();
        let built = (|| -> Result<()> {
            conn.execute_batch(
                "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(id UNINDEXED, file_path UNINDEXED, content);",
            )?;
            conn.execute("DELETE FROM chunks_fts", [])?;
            conn.execute(
                "INSERT INTO chunks_fts (id, file_path, content) SELECT id, file_path, content FROM chunks",
                [],
            )?;
            Ok(())
        })();
        match built {
            Ok(()) => {
                self.fts_ready.store(true, Ordering::Relaxed);
                self.fts_build_count.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(err) => {
                log::warn!("FTS5 index unavailable ({err}); falling back to vector-only search");
                false
            }
        }
    }

    fn ensure_vector_index(&self, row_count: u64) {
        if self.vector_index_ready.load(Ordering::Relaxed) {
            return;
        }
        if row_count > VECTOR_INDEX_ROW_THRESHOLD {
            self.vector_index_ready.store(true, Ordering::Relaxed);
            self.vector_index_build_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn fts_build_count(&self) -> usize {
        self.fts_build_count.load(Ordering::Relaxed)
    }

    pub fn vector_index_build_count(&self) -> usize {
        self.vector_index_build_count.load(Ordering::Relaxed)
    }

    pub fn search_vector(&self, query: &[f32], k: usize) -> Result<SearchResults> {
        let start = Instant::now();
        let total_chunks = self.count()?;
        self.ensure_vector_index(total_chunks);

        let scored = self.scan_by_cosine(query, k)?;
        let results = scored
            .into_iter()
            .map(|(score, row)| SearchResult {
                file_path: row.file_path,
                start_line: row.start_line,
                end_line: row.end_line,
                content: row.content,
                score: score as f64,
                match_type: MatchType::Vector,
            })
            .collect();

        Ok(SearchResults {
            results,
            query_time_ms: lgrep_protocol::round_ms(start.elapsed()),
            total_chunks,
        })
    }

    pub fn search_hybrid(&self, query: &[f32], text: &str, k: usize) -> Result<SearchResults> {
        let start = Instant::now();
        let total_chunks = self.count()?;
        self.ensure_vector_index(total_chunks);

        if !self.ensure_fts_index() {
            let mut fallback = self.search_vector(query, k)?;
            fallback.query_time_ms = lgrep_protocol::round_ms(start.elapsed());
            return Ok(fallback);
        }

        let vector_ranked = self.scan_by_cosine(query, k.max(50))?;
        let vector_ids: Vec<String> = vector_ranked.iter().map(|(_, row)| row.id.clone()).collect();
        let text_ids = self.fts_query(text, k.max(50))?;

        let fused = rrf_fuse(&[&vector_ids, &text_ids], DEFAULT_RRF_K, k);
        let rows_by_id = self.fetch_rows_by_id(
            &fused.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>(),
        )?;

        let results = fused
            .into_iter()
            .filter_map(|(id, score)| {
                rows_by_id.get(&id).map(|row| SearchResult {
                    file_path: row.file_path.clone(),
                    start_line: row.start_line,
                    end_line: row.end_line,
                    content: row.content.clone(),
                    score,
                    match_type: MatchType::Hybrid,
                })
            })
            .collect();

        Ok(SearchResults {
            results,
            query_time_ms: lgrep_protocol::round_ms(start.elapsed()),
            total_chunks,
        })
    }

    fn fts_query(&self, text: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM chunks_fts WHERE chunks_fts MATCH ?1 ORDER BY rank LIMIT ?2",
        )?;
        let sanitized = sanitize_fts_query(text);
        let rows = stmt.query_map(params![sanitized, limit as i64], |row| row.get::<_, String>(0));
        match rows {
            Ok(rows) => {
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                Ok(ids)
            }
            Err(err) => {
                log::warn!("FTS query failed ({err}), treating as no text matches");
                Ok(Vec::new())
            }
        }
    }

    fn scan_by_cosine(&self, query: &[f32], k: usize) -> Result<Vec<(f32, ChunkRow)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, file_path, start_line, end_line, content, embedding FROM chunks",
        )?;
        let mut rows = stmt.query([])?;

        let mut heap: BinaryHeap<ScoredRow> = BinaryHeap::with_capacity(k + 1);
        while let Some(row) = rows.next()? {
            let embedding_blob: Vec<u8> = row.get(5)?;
            let embedding = decode_embedding(&embedding_blob);
            let score = cosine_similarity(query, &embedding);
            let chunk_row = ChunkRow {
                id: row.get(0)?,
                file_path: row.get(1)?,
                start_line: row.get::<_, i64>(2)? as u32,
                end_line: row.get::<_, i64>(3)? as u32,
                content: row.get(4)?,
            };
            heap.push(ScoredRow { score, row: chunk_row });
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut out: Vec<(f32, ChunkRow)> = heap.into_sorted_vec().into_iter().map(|s| (s.score, s.row)).collect();
        out.reverse();
        Ok(out)
    }

    fn fetch_rows_by_id(&self, ids: &[String]) -> Result<std::collections::HashMap<String, ChunkRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, file_path, start_line, end_line, content FROM chunks WHERE id = ?1",
        )?;
        let mut out = std::collections::HashMap::new();
        for id in ids {
            let mut rows = stmt.query(params![id])?;
            if let Some(row) = rows.next()? {
                out.insert(
                    id.clone(),
                    ChunkRow {
                        id: row.get(0)?,
                        file_path: row.get(1)?,
                        start_line: row.get::<_, i64>(2)? as u32,
                        end_line: row.get::<_, i64>(3)? as u32,
                        content: row.get(4)?,
                    },
                );
            }
        }
        Ok(out)
    }
}

struct ChunkRow {
    id: String,
    file_path: String,
    start_line: u32,
    end_line: u32,
    content: String,
}

struct ScoredRow {
    score: f32,
    row: ChunkRow,
}

impl PartialEq for ScoredRow {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for ScoredRow {}
impl PartialOrd for ScoredRow {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredRow {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap on score: `pop` discards the current worst once full.
        other.score.partial_cmp(&self.score).unwrap_or(std::cmp::Ordering::Equal)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// FTS5 MATCH syntax treats several characters specially; quote each term
/// so a query like `don't` or `a-b` doesn't throw a syntax error.
fn sanitize_fts_query(text: &str) -> String {
    text.split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn create_chunks_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            file_hash TEXT NOT NULL,
            indexed_at_unix_ms INTEGER NOT NULL,
            UNIQUE(file_path, chunk_index)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path)",
        [],
    )?;
    Ok(())
}

fn insert_chunk(conn: &Connection, chunk: &Chunk, replace: bool) -> Result<()> {
    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
    let sql = format!(
        "{verb} INTO chunks (id, file_path, chunk_index, start_line, end_line, content, embedding, file_hash, indexed_at_unix_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
    );
    conn.execute(
        &sql,
        params![
            chunk.id,
            chunk.file_path,
            chunk.chunk_index,
            chunk.start_line,
            chunk.end_line,
            chunk.text,
            encode_embedding(&chunk.embedding),
            chunk.file_hash,
            chunk.indexed_at_unix_ms,
        ],
    )?;
    Ok(())
}

/// `chunks_fts` has no uniqueness constraint of its own (FTS5 virtual
/// tables don't enforce one), so a changed chunk is deleted by id before
/// being re-inserted rather than relying on `INSERT OR REPLACE`.
fn sync_fts_row(conn: &Connection, chunk: &Chunk) -> Result<()> {
    conn.execute("DELETE FROM chunks_fts WHERE id = ?1", params![chunk.id])?;
    conn.execute(
        "INSERT INTO chunks_fts (id, file_path, content) VALUES (?1, ?2, ?3)",
        params![chunk.id, chunk.file_path, chunk.text],
    )?;
    Ok(())
}

fn open_and_prepare(db_path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    // Touch the schema so a corrupted (non-SQLite) file fails here, at
    // open time, rather than surfacing later from an unrelated query.
    conn.query_row("SELECT name FROM sqlite_master LIMIT 1", [], |_| Ok(()))
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(()),
            err => Err(err),
        })?;
    Ok(conn)
}

fn clear_dir_contents(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}
