//! Request orchestration.
//!
//! One [`Pipeline`] serves one request at a time: ingestion drives the
//! extraction stream into the graph, retrieval expands the query's seed
//! entities and interleaves the per-seed batches into a single bounded
//! context.

pub mod roundrobin;

pub use roundrobin::round_robin;

use futures_util::future::try_join_all;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::events::GraphEvent;
use crate::extract::{EntityExtractor, Extraction};
use crate::graph::{Expander, Persisted, RankedRelationship, UpsertEngine};

/// Counters for one completed ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Entity events merged into nodes.
    pub nodes: usize,
    /// Relationship events merged into edges.
    pub edges: usize,
    /// Lines the parser could not recover.
    pub malformed: usize,
}

/// Extraction, upsert and expansion wired together.
pub struct Pipeline {
    extractor: EntityExtractor,
    engine: UpsertEngine,
    expander: Expander,
    global_cap: usize,
}

impl Pipeline {
    pub fn new(
        extractor: EntityExtractor,
        engine: UpsertEngine,
        expander: Expander,
        global_cap: usize,
    ) -> Self {
        Self {
            extractor,
            engine,
            expander,
            global_cap,
        }
    }

    /// Ingest one piece of text: stream the extraction model's answer and
    /// merge every event into the graph in arrival order.
    ///
    /// Malformed lines are counted and skipped. A store or stream failure
    /// aborts the run; events committed before the failure stand.
    pub async fn ingest(&self, input: &str) -> Result<IngestReport> {
        let start = Instant::now();
        let mut report = IngestReport::default();

        let malformed = Arc::new(AtomicUsize::new(0));
        let malformed_seen = malformed.clone();
        let extractions = self.extractor.stream(input).await?.inspect(move |item| {
            if let Ok(Extraction::Malformed(_)) = item {
                malformed_seen.fetch_add(1, Ordering::Relaxed);
            }
        });

        let mut persisted = Box::pin(self.engine.run(extractions));
        while let Some(record) = persisted.next().await {
            match record? {
                Persisted::Node(node) => {
                    report.nodes += 1;
                    log::info!("Merged entity {}", node.name);
                }
                Persisted::Edge(edge) => {
                    report.edges += 1;
                    log::info!(
                        "Merged relationship {} {} {}",
                        edge.from.name,
                        edge.rel_type,
                        edge.to.name
                    );
                }
            }
        }

        report.malformed = malformed.load(Ordering::Relaxed);
        log::info!(
            "Ingestion complete: {} entities, {} relationships, {} malformed lines in {:?}",
            report.nodes,
            report.edges,
            report.malformed,
            start.elapsed()
        );
        Ok(report)
    }

    /// Retrieve context for a question: extract its entities, expand every
    /// seed into a ranked batch, and interleave the batches round robin
    /// under the global cap.
    ///
    /// Seeds expand concurrently but combine in extraction order, so the
    /// result is deterministic for a given graph.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RankedRelationship>> {
        let (events, malformed) = self.extractor.invoke(query).await?;
        for bad in &malformed {
            log::warn!("Skipping malformed line: {} ({})", bad.line, bad.reason);
        }

        let seeds: Vec<&str> = events
            .iter()
            .filter_map(|event| match event {
                GraphEvent::Entity { name, .. } => Some(name.as_str()),
                GraphEvent::Relationship { .. } => None,
            })
            .collect();
        log::debug!("Query extracted {} seed entities", seeds.len());

        let batches =
            try_join_all(seeds.iter().map(|seed| self.expander.expand_seed(seed))).await?;
        Ok(round_robin(batches, self.global_cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::extract::PromptTemplate;
    use crate::graph::{ExpandOptions, GraphStore, SqliteGraphStore};
    use crate::index::{SimilarityIndex, SqliteSimilarityIndex};
    use crate::llm::testing::{FakeEmbedder, ScriptedGeneration};
    use tempfile::TempDir;

    async fn stores() -> (Arc<dyn GraphStore>, Arc<dyn SimilarityIndex>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Db::new(temp_dir.path().join("test.db")));
        db.migrate().await.unwrap();

        let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(db.clone()));
        let index: Arc<dyn SimilarityIndex> =
            Arc::new(SqliteSimilarityIndex::new(db, Arc::new(FakeEmbedder), 100));
        (store, index, temp_dir)
    }

    fn pipeline<I, S>(
        script: I,
        store: Arc<dyn GraphStore>,
        index: Arc<dyn SimilarityIndex>,
        options: ExpandOptions,
        global_cap: usize,
    ) -> Pipeline
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let service = Arc::new(ScriptedGeneration::new(script));
        let extractor = EntityExtractor::new(service, PromptTemplate::new("{input}"), "test");
        let engine = UpsertEngine::new(store.clone(), index.clone());
        let expander = Expander::new(store, index, options);
        Pipeline::new(extractor, engine, expander, global_cap)
    }

    #[tokio::test]
    async fn test_ingest_apollo_landing() {
        let (store, index, _tmp) = stores().await;
        let script = [concat!(
            r#"{"is": "entity", "name": "Apollo 11", "types": ["Mission"], "emphasis": 9}"#,
            "\n",
            "not json\n",
            r#"{"is": "relationship", "from": "Apollo 11", "to": "Moon", "type": "landed on", "emphasis": 8}"#,
        )];
        let p = pipeline(
            script,
            store.clone(),
            index.clone(),
            ExpandOptions::default(),
            20,
        );

        let report = p.ingest("the mission text").await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                nodes: 1,
                edges: 1,
                malformed: 1,
            }
        );

        let edges = store.incident_edges("APOLLO_11").await.unwrap();
        assert_eq!(edges.len(), 1);
        let edge = &edges[0];
        assert_eq!(edge.rel_type, "LANDED_ON");
        assert_eq!(edge.count, 1);
        assert_eq!(edge.from.name, "APOLLO_11");
        assert_eq!(edge.from.count, 1);
        assert!((edge.from.harmonic - 1.0 / 0.9).abs() < 1e-9);
        assert_eq!(edge.to.name, "MOON");
        assert_eq!(edge.to.count, 1);
        assert_eq!(edge.to.harmonic, 0.0);

        // Three identities in the index; the repeated Apollo 11 mention did
        // not produce a duplicate.
        let entries = index.similarity_search("Apollo", 10).await.unwrap();
        let mut ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["APOLLO_11", "LANDED_ON", "MOON"]);
    }

    #[tokio::test]
    async fn test_retrieve_interleaves_seeds_under_global_cap() {
        let (store, index, _tmp) = stores().await;

        let seeding = UpsertEngine::new(store.clone(), index.clone());
        for (from, to, emphasis) in [
            ("Hub A", "Alpha Target", 0.9),
            ("Hub A", "Beta Target", 0.5),
            ("Hub B", "Gamma Target", 0.9),
            ("Hub B", "Delta Target", 0.5),
        ] {
            seeding
                .apply(&GraphEvent::Relationship {
                    from: from.to_string(),
                    to: to.to_string(),
                    rel_type: "links to".to_string(),
                    emphasis,
                })
                .await
                .unwrap();
        }

        // The query names both hubs; its relationship line yields no seed.
        let script = [concat!(
            r#"{"is": "entity", "name": "Hub A", "types": [], "emphasis": 9}"#,
            "\n",
            r#"{"is": "entity", "name": "Hub B", "types": [], "emphasis": 9}"#,
            "\n",
            r#"{"is": "relationship", "from": "Hub A", "to": "Hub B", "type": "near", "emphasis": 5}"#,
        )];
        let options = ExpandOptions {
            seed_k: 1,
            limit: 10,
        };
        let p = pipeline(script, store, index, options, 3);

        // Each hub's strongest edge makes it in before either hub's second,
        // and the cap cuts the rotation mid-round.
        let merged = p.retrieve("which hubs?").await.unwrap();
        let targets: Vec<&str> = merged.iter().map(|r| r.edge.to.name.as_str()).collect();
        assert_eq!(targets, vec!["ALPHA_TARGET", "GAMMA_TARGET", "BETA_TARGET"]);
    }

    #[tokio::test]
    async fn test_retrieve_with_no_seeds_is_empty() {
        let (store, index, _tmp) = stores().await;
        let p = pipeline(
            ["no json here at all"],
            store,
            index,
            ExpandOptions::default(),
            20,
        );

        let merged = p.retrieve("anything").await.unwrap();
        assert!(merged.is_empty());
    }
}
