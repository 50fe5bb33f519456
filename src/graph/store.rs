//! Graph persistence: the `GraphStore` service contract and its SQLite
//! implementation.
//!
//! Every store call is atomic. A merge opens a transaction, applies the
//! find-or-create and accumulation steps, commits, and returns the updated
//! record; the transaction is released on every exit path before the caller
//! touches anything else.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::Arc;

use crate::db::Db;
use crate::error::{GraphRagError, Result};
use crate::graph::{Edge, Node};

/// Storage contract for the knowledge graph.
///
/// Callers pass normalized identifiers; the store never normalizes.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Find or create the node `name`, union `labels` into its label set and
    /// accumulate one observation: count += 1, harmonic += `inv_emphasis`.
    /// Returns the updated node.
    async fn merge_entity(&self, name: &str, labels: &[String], inv_emphasis: f64)
        -> Result<Node>;

    /// Find or create both endpoint nodes and the directed edge (from, to,
    /// rel_type), then accumulate one observation on the edge. A newly
    /// created endpoint starts at count 1 with an empty harmonic; an
    /// existing endpoint is left untouched. Returns the updated edge with
    /// both endpoints resolved.
    async fn merge_relationship(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
        inv_emphasis: f64,
    ) -> Result<Edge>;

    /// All edges touching `name` in either direction. Each returned edge
    /// keeps its stored orientation regardless of which endpoint matched.
    async fn incident_edges(&self, name: &str) -> Result<Vec<Edge>>;
}

/// SQLite-backed graph store.
pub struct SqliteGraphStore {
    db: Arc<Db>,
}

impl SqliteGraphStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn merge_entity(
        &self,
        name: &str,
        labels: &[String],
        inv_emphasis: f64,
    ) -> Result<Node> {
        let name = name.to_string();
        let labels = labels.to_vec();

        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;

                tx.execute(
                    "INSERT INTO nodes (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                    params![name],
                )?;

                let existing: String = tx.query_row(
                    "SELECT labels FROM nodes WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                let mut merged: Vec<String> = serde_json::from_str(&existing).map_err(|e| {
                    GraphRagError::Graph(format!("invalid labels column for {}: {}", name, e))
                })?;
                for label in &labels {
                    if !merged.contains(label) {
                        merged.push(label.clone());
                    }
                }
                merged.sort();
                let merged_json = serde_json::to_string(&merged).map_err(|e| {
                    GraphRagError::Graph(format!("failed to encode labels: {}", e))
                })?;

                tx.execute(
                    "UPDATE nodes SET labels = ?2, count = count + 1, harmonic = harmonic + ?3 \
                     WHERE name = ?1",
                    params![name, merged_json, inv_emphasis],
                )?;

                let node = read_node(&tx, &name)?;
                tx.commit()?;
                Ok(node)
            })
            .await
    }

    async fn merge_relationship(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
        inv_emphasis: f64,
    ) -> Result<Edge> {
        let from = from.to_string();
        let to = to.to_string();
        let rel_type = rel_type.to_string();

        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;

                // Endpoints must exist. A created endpoint records one
                // observation with no emphasis evidence; an existing one
                // keeps whatever it has accumulated.
                tx.execute(
                    "INSERT INTO nodes (name, count) VALUES (?1, 1) \
                     ON CONFLICT(name) DO NOTHING",
                    params![from],
                )?;
                tx.execute(
                    "INSERT INTO nodes (name, count) VALUES (?1, 1) \
                     ON CONFLICT(name) DO NOTHING",
                    params![to],
                )?;

                tx.execute(
                    "INSERT INTO edges (source_name, target_name, rel_type, count, harmonic) \
                     VALUES (?1, ?2, ?3, 1, ?4) \
                     ON CONFLICT(source_name, target_name, rel_type) DO UPDATE SET \
                         count = count + 1, \
                         harmonic = harmonic + excluded.harmonic",
                    params![from, to, rel_type, inv_emphasis],
                )?;

                let edge = read_edge(&tx, &from, &to, &rel_type)?;
                tx.commit()?;
                Ok(edge)
            })
            .await
    }

    async fn incident_edges(&self, name: &str) -> Result<Vec<Edge>> {
        let name = name.to_string();

        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT source_name, target_name, rel_type, count, harmonic FROM edges \
                     WHERE source_name = ?1 OR target_name = ?1 \
                     ORDER BY source_name, target_name, rel_type",
                )?;
                let rows: Vec<(String, String, String, i64, f64)> = stmt
                    .query_map(params![name], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
                    .map_err(GraphRagError::Database)?;

                let mut edges = Vec::with_capacity(rows.len());
                for (source, target, rel_type, count, harmonic) in rows {
                    let from = read_node(conn, &source)?;
                    let to = read_node(conn, &target)?;
                    edges.push(Edge {
                        from,
                        to,
                        rel_type,
                        count: count as u64,
                        harmonic,
                    });
                }
                Ok(edges)
            })
            .await
    }
}

fn read_node(conn: &Connection, name: &str) -> Result<Node> {
    let (name, labels_json, count, harmonic): (String, String, i64, f64) = conn.query_row(
        "SELECT name, labels, count, harmonic FROM nodes WHERE name = ?1",
        params![name],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    let labels: Vec<String> = serde_json::from_str(&labels_json).map_err(|e| {
        GraphRagError::Graph(format!("invalid labels column for {}: {}", name, e))
    })?;
    Ok(Node {
        name,
        labels,
        count: count as u64,
        harmonic,
    })
}

fn read_edge(conn: &Connection, from: &str, to: &str, rel_type: &str) -> Result<Edge> {
    let (count, harmonic): (i64, f64) = conn.query_row(
        "SELECT count, harmonic FROM edges \
         WHERE source_name = ?1 AND target_name = ?2 AND rel_type = ?3",
        params![from, to, rel_type],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let from = read_node(conn, from)?;
    let to = read_node(conn, to)?;
    Ok(Edge {
        from,
        to,
        rel_type: rel_type.to_string(),
        count: count as u64,
        harmonic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_store() -> (SqliteGraphStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Db::new(temp_dir.path().join("test.db")));
        db.migrate().await.unwrap();
        (SqliteGraphStore::new(db), temp_dir)
    }

    #[tokio::test]
    async fn test_merge_entity_creates_and_accumulates() {
        let (store, _tmp) = setup_store().await;

        let node = store
            .merge_entity("APOLLO_11", &["SPACECRAFT".to_string()], 1.0 / 0.9)
            .await
            .unwrap();
        assert_eq!(node.name, "APOLLO_11");
        assert_eq!(node.labels, vec!["SPACECRAFT".to_string()]);
        assert_eq!(node.count, 1);
        assert!((node.harmonic - 1.0 / 0.9).abs() < 1e-9);

        let node = store
            .merge_entity("APOLLO_11", &["MISSION".to_string()], 1.0 / 0.5)
            .await
            .unwrap();
        assert_eq!(node.count, 2);
        assert!((node.harmonic - (1.0 / 0.9 + 1.0 / 0.5)).abs() < 1e-9);
        assert_eq!(
            node.labels,
            vec!["MISSION".to_string(), "SPACECRAFT".to_string()]
        );
    }

    #[tokio::test]
    async fn test_merge_entity_label_union_idempotent() {
        let (store, _tmp) = setup_store().await;

        store
            .merge_entity("MOON", &["BODY".to_string()], 1.0)
            .await
            .unwrap();
        let node = store
            .merge_entity("MOON", &["BODY".to_string()], 1.0)
            .await
            .unwrap();
        assert_eq!(node.labels, vec!["BODY".to_string()]);
        assert_eq!(node.count, 2);
    }

    #[tokio::test]
    async fn test_merge_relationship_creates_endpoints_observed_once() {
        let (store, _tmp) = setup_store().await;

        let edge = store
            .merge_relationship("APOLLO_11", "MOON", "LANDED_ON", 1.0 / 0.8)
            .await
            .unwrap();

        assert_eq!(edge.from.name, "APOLLO_11");
        assert_eq!(edge.to.name, "MOON");
        assert_eq!(edge.rel_type, "LANDED_ON");
        assert_eq!(edge.count, 1);
        assert!((edge.harmonic - 1.0 / 0.8).abs() < 1e-9);

        // Created endpoints carry one observation and no emphasis evidence.
        assert_eq!(edge.from.count, 1);
        assert_eq!(edge.from.harmonic, 0.0);
        assert_eq!(edge.to.count, 1);
        assert_eq!(edge.to.harmonic, 0.0);
        assert!(edge.to.labels.is_empty());

        // Merging again accumulates on the edge only.
        let edge = store
            .merge_relationship("APOLLO_11", "MOON", "LANDED_ON", 1.0 / 0.8)
            .await
            .unwrap();
        assert_eq!(edge.count, 2);
        assert_eq!(edge.from.count, 1);
        assert_eq!(edge.to.count, 1);
    }

    #[tokio::test]
    async fn test_merge_relationship_accumulates_on_edge() {
        let (store, _tmp) = setup_store().await;

        store
            .merge_relationship("A", "B", "KNOWS", 2.0)
            .await
            .unwrap();
        let edge = store
            .merge_relationship("A", "B", "KNOWS", 4.0)
            .await
            .unwrap();
        assert_eq!(edge.count, 2);
        assert!((edge.harmonic - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_distinct_rel_types_are_distinct_edges() {
        let (store, _tmp) = setup_store().await;

        store
            .merge_relationship("A", "B", "KNOWS", 1.0)
            .await
            .unwrap();
        store
            .merge_relationship("A", "B", "LIKES", 1.0)
            .await
            .unwrap();

        let edges = store.incident_edges("A").await.unwrap();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].count, 1);
        assert_eq!(edges[1].count, 1);
    }

    #[tokio::test]
    async fn test_incident_edges_keeps_stored_orientation() {
        let (store, _tmp) = setup_store().await;

        store
            .merge_relationship("APOLLO_11", "MOON", "LANDED_ON", 1.0)
            .await
            .unwrap();
        store
            .merge_relationship("MOON", "EARTH", "ORBITS", 1.0)
            .await
            .unwrap();

        // MOON is the target of one edge and the source of the other; both
        // come back with their true direction.
        let edges = store.incident_edges("MOON").await.unwrap();
        assert_eq!(edges.len(), 2);

        let landed = edges.iter().find(|e| e.rel_type == "LANDED_ON").unwrap();
        assert_eq!(landed.from.name, "APOLLO_11");
        assert_eq!(landed.to.name, "MOON");

        let orbits = edges.iter().find(|e| e.rel_type == "ORBITS").unwrap();
        assert_eq!(orbits.from.name, "MOON");
        assert_eq!(orbits.to.name, "EARTH");
    }

    #[tokio::test]
    async fn test_incident_edges_empty_for_unknown_node() {
        let (store, _tmp) = setup_store().await;
        let edges = store.incident_edges("NOBODY").await.unwrap();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn test_entity_then_relationship_shares_node() {
        let (store, _tmp) = setup_store().await;

        store
            .merge_entity("APOLLO_11", &["SPACECRAFT".to_string()], 1.0)
            .await
            .unwrap();
        let edge = store
            .merge_relationship("APOLLO_11", "MOON", "LANDED_ON", 1.0)
            .await
            .unwrap();

        // The endpoint resolves to the previously merged entity node.
        assert_eq!(edge.from.count, 1);
        assert_eq!(edge.from.labels, vec!["SPACECRAFT".to_string()]);

        // An entity merge accumulates on top of an endpoint bootstrap.
        let node = store
            .merge_entity("MOON", &["BODY".to_string()], 2.0)
            .await
            .unwrap();
        assert_eq!(node.count, 2);
        assert!((node.harmonic - 2.0).abs() < 1e-9);
    }
}
