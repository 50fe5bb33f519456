use async_trait::async_trait;
use lru::LruCache;
use rusqlite::params;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::db::Db;
use crate::error::{GraphRagError, Result};
use crate::index::{EntryKind, IndexEntry, SimilarityIndex};
use crate::llm::Embedder;

/// SQLite-backed similarity index.
///
/// Stores one row per entry with the content embedding as a little-endian
/// f32 BLOB. Search embeds the query text and scores every stored entry by
/// cosine similarity in memory; this is an exact scan, not an approximate
/// index. An LRU cache in front of the embedder avoids re-embedding
/// frequently seen content and repeated queries.
pub struct SqliteSimilarityIndex {
    db: Arc<Db>,
    embedder: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl SqliteSimilarityIndex {
    /// Create a new index over `db` using `embedder` for content vectors.
    ///
    /// # Panics
    ///
    /// Panics if `cache_capacity` is 0 (LRU cache requires non-zero capacity)
    pub fn new(db: Arc<Db>, embedder: Arc<dyn Embedder>, cache_capacity: usize) -> Self {
        let cap = NonZeroUsize::new(cache_capacity.max(1))
            .expect("Cache capacity must be at least 1");

        Self {
            db,
            embedder,
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    async fn embed_cached(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.lock().unwrap().get(text).cloned() {
            log::debug!("Embedding cache hit for: {}", text);
            return Ok(cached);
        }

        let embedding = self.embedder.embed(text).await?;
        self.cache
            .lock()
            .unwrap()
            .put(text.to_string(), embedding.clone());

        Ok(embedding)
    }
}

#[async_trait]
impl SimilarityIndex for SqliteSimilarityIndex {
    async fn add_document(&self, entry: &IndexEntry) -> Result<()> {
        let embedding = self.embed_cached(&entry.content).await?;
        let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();

        let id = entry.id.clone();
        let content = entry.content.clone();
        let kind = entry.kind.as_str();

        self.db
            .with_connection(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO index_entries (id, content, kind, embedding) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, content, kind, bytes],
                )?;

                if inserted == 0 {
                    return Err(GraphRagError::DuplicateId(id));
                }

                Ok(())
            })
            .await
    }

    async fn similarity_search(&self, text: &str, k: usize) -> Result<Vec<IndexEntry>> {
        let start = std::time::Instant::now();
        let query_vec = self.embed_cached(text).await?;

        let rows = self
            .db
            .with_connection(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, content, kind, embedding FROM index_entries")?;
                let rows: Vec<(String, String, String, Vec<u8>)> = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
                    .map_err(GraphRagError::Database)?;
                Ok(rows)
            })
            .await?;

        let mut scored: Vec<(f32, IndexEntry)> = Vec::with_capacity(rows.len());
        for (id, content, kind, blob) in rows {
            let embedding = decode_embedding(&blob)?;
            let score = cosine_similarity(&query_vec, &embedding);
            scored.push((
                score,
                IndexEntry {
                    content,
                    id,
                    kind: parse_kind(&kind)?,
                },
            ));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        log::debug!(
            "Similarity search over {} entries took {:?}",
            scored.len(),
            start.elapsed()
        );

        Ok(scored.into_iter().take(k).map(|(_, e)| e).collect())
    }
}

/// Convert an embedding BLOB back to a float vector
fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    let mut floats = Vec::with_capacity(blob.len() / 4);
    for bytes in blob.chunks(4) {
        let arr: [u8; 4] = bytes
            .try_into()
            .map_err(|_| GraphRagError::Index("Invalid embedding BLOB length".to_string()))?;
        floats.push(f32::from_le_bytes(arr));
    }
    Ok(floats)
}

/// Compute cosine similarity between two vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

fn parse_kind(s: &str) -> Result<EntryKind> {
    match s {
        "entity" => Ok(EntryKind::Entity),
        "relationship" => Ok(EntryKind::Relationship),
        other => Err(GraphRagError::Index(format!(
            "Unknown entry kind: {}",
            other
        ))),
    }
}
