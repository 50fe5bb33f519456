use async_stream::stream;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;

use crate::error::{GraphRagError, Result};
use crate::events::GraphEvent;
use crate::extract::Extraction;
use crate::graph::{normalize_name, Edge, GraphStore, Node};
use crate::index::{EntryKind, IndexEntry, SimilarityIndex};

/// The record a single event became after merging.
#[derive(Debug, Clone, PartialEq)]
pub enum Persisted {
    Node(Node),
    Edge(Edge),
}

/// Merges graph events into the store and mirrors every unique identity
/// into the similarity index.
pub struct UpsertEngine {
    store: Arc<dyn GraphStore>,
    index: Arc<dyn SimilarityIndex>,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn GraphStore>, index: Arc<dyn SimilarityIndex>) -> Self {
        Self { store, index }
    }

    /// Apply one event: normalize its names, merge it into the store, then
    /// mirror every identity the event touched into the similarity index
    /// (the node for an entity; both endpoints and the type for a
    /// relationship).
    ///
    /// The store merge commits before the index writes start, so an index
    /// failure leaves a merged event without a mirror entry. Duplicate-id
    /// rejections are expected (identities repeat across events) and are
    /// swallowed; any other index error is returned for this event.
    pub async fn apply(&self, event: &GraphEvent) -> Result<Persisted> {
        match event {
            GraphEvent::Entity {
                name,
                types,
                emphasis,
            } => {
                let id = normalize_name(name);
                let mut labels: Vec<String> =
                    types.iter().map(|t| normalize_name(t)).collect();
                labels.sort();
                labels.dedup();

                let node = self
                    .store
                    .merge_entity(&id, &labels, 1.0 / *emphasis)
                    .await?;
                self.mirror(name, &id, EntryKind::Entity).await?;

                Ok(Persisted::Node(node))
            }
            GraphEvent::Relationship {
                from,
                to,
                rel_type,
                emphasis,
            } => {
                let from_id = normalize_name(from);
                let to_id = normalize_name(to);
                let type_id = normalize_name(rel_type);

                let edge = self
                    .store
                    .merge_relationship(&from_id, &to_id, &type_id, 1.0 / *emphasis)
                    .await?;
                self.mirror(from, &from_id, EntryKind::Entity).await?;
                self.mirror(to, &to_id, EntryKind::Entity).await?;
                self.mirror(rel_type, &type_id, EntryKind::Relationship).await?;

                Ok(Persisted::Edge(edge))
            }
        }
    }

    /// Drive a whole extraction stream through the engine, in input order.
    ///
    /// Malformed lines are logged and skipped. A source error or a store
    /// error ends the stream; everything committed before it stands. An
    /// index error only costs the current event its mirror entry, and the
    /// stream moves on.
    pub fn run<'a, S>(&'a self, events: S) -> impl Stream<Item = Result<Persisted>> + 'a
    where
        S: Stream<Item = Result<Extraction>> + Unpin + 'a,
    {
        stream! {
            let mut events = events;

            while let Some(item) = events.next().await {
                match item {
                    Ok(Extraction::Event(event)) => match self.apply(&event).await {
                        Ok(persisted) => yield Ok(persisted),
                        Err(e @ (GraphRagError::Index(_) | GraphRagError::Embedding(_))) => {
                            log::warn!("Index mirror failed, continuing: {}", e);
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    },
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

    async fn mirror(&self, content: &str, id: &str, kind: EntryKind) -> Result<()> {
        let entry = IndexEntry {
            content: content.to_string(),
            id: id.to_string(),
            kind,
        };

        match self.index.add_document(&entry).await {
            Ok(()) => Ok(()),
            Err(GraphRagError::DuplicateId(id)) => {
                log::debug!("Index entry {} already present", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
