//! Retrieval expansion: from seed entities to ranked relationship batches.

use async_stream::stream;
use futures_util::future::try_join_all;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;

use crate::error::Result;
use crate::events::GraphEvent;
use crate::extract::Extraction;
use crate::graph::{rank_relationships, Edge, GraphStore, RankedRelationship};
use crate::index::{EntryKind, SimilarityIndex};

/// Tuning knobs for retrieval expansion.
#[derive(Debug, Clone, Copy)]
pub struct ExpandOptions {
    /// How many similarity hits to expand per seed entity.
    pub seed_k: usize,
    /// Upper bound on relationships returned per seed entity.
    pub limit: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            seed_k: 5,
            limit: 10,
        }
    }
}

/// Expands seed entities into ranked, size-bounded relationship batches.
pub struct Expander {
    store: Arc<dyn GraphStore>,
    index: Arc<dyn SimilarityIndex>,
    options: ExpandOptions,
}

impl Expander {
    pub fn new(
        store: Arc<dyn GraphStore>,
        index: Arc<dyn SimilarityIndex>,
        options: ExpandOptions,
    ) -> Self {
        Self {
            store,
            index,
            options,
        }
    }

    /// Expand one seed entity into at most `limit` ranked relationships.
    ///
    /// The seed's raw name goes through the similarity index to find the
    /// `seed_k` nearest entries; hits that are not entities are discarded
    /// after retrieval, not excluded from the query. Every surviving hit
    /// contributes all edges incident to its node, fetched concurrently
    /// since the hits are distinct keys. The candidates are concatenated in
    /// hit order without deduplication, ranked by harmonic score and
    /// truncated.
    pub async fn expand_seed(&self, raw_name: &str) -> Result<Vec<RankedRelationship>> {
        let start = std::time::Instant::now();

        let hits = self
            .index
            .similarity_search(raw_name, self.options.seed_k)
            .await?;
        let entity_hits: Vec<_> = hits
            .into_iter()
            .filter(|hit| hit.kind == EntryKind::Entity)
            .collect();

        let fetches = entity_hits
            .iter()
            .map(|hit| self.store.incident_edges(&hit.id));
        let candidates: Vec<Edge> = try_join_all(fetches)
            .await?
            .into_iter()
            .flatten()
            .collect();

        log::debug!(
            "Seed '{}': {} entity hits, {} candidate edges in {:?}",
            raw_name,
            entity_hits.len(),
            candidates.len(),
            start.elapsed()
        );

        let mut ranked = rank_relationships(candidates);
        ranked.truncate(self.options.limit);
        Ok(ranked)
    }

    /// Expand a query's extraction stream: one ranked batch per entity
    /// event, in input order.
    ///
    /// Relationship events carry no seed and are skipped; malformed lines
    /// are logged and skipped. A lookup failure or source error is yielded
    /// as `Err` and ends the stream.
    pub fn run<'a, S>(
        &'a self,
        events: S,
    ) -> impl Stream<Item = Result<Vec<RankedRelationship>>> + 'a
    where
        S: Stream<Item = Result<Extraction>> + Unpin + 'a,
    {
        stream! {
            let mut events = events;

            while let Some(item) = events.next().await {
                match item {
                    Ok(Extraction::Event(GraphEvent::Entity { name, .. })) => {
                        match self.expand_seed(&name).await {
                            Ok(batch) => yield Ok(batch),
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                    Ok(Extraction::Event(GraphEvent::Relationship { .. })) => {}
                    Ok(Extraction::Malformed(bad)) => {
                        log::warn!("Skipping malformed line: {} ({})", bad.line, bad.reason);
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }
    }
}
