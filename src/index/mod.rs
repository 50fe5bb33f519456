//! Similarity index: mirrors every unique graph identity so retrieval can
//! find seed nodes by fuzzy text lookup.

pub mod sqlite;

pub use sqlite::SqliteSimilarityIndex;

use async_trait::async_trait;

use crate::error::Result;

/// What a persisted identity is: an entity node or a relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Entity,
    Relationship,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Entity => "entity",
            EntryKind::Relationship => "relationship",
        }
    }
}

/// One similarity-index document.
///
/// `content` is the raw (un-normalized) text the identity was first seen
/// under; `id` is the normalized graph identifier it maps back to. Entries
/// are written once at first merge and never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub content: String,
    pub id: String,
    pub kind: EntryKind,
}

/// Nearest-by-text lookup over index entries.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Add one entry. Returns `GraphRagError::DuplicateId` when an entry
    /// with the same id already exists; the stored entry is left as is.
    async fn add_document(&self, entry: &IndexEntry) -> Result<()>;

    /// The `k` entries whose content is nearest to `text`, best first.
    /// No kind filtering happens here; callers filter the hits they want.
    async fn similarity_search(&self, text: &str, k: usize) -> Result<Vec<IndexEntry>>;
}
