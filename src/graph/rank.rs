//! Harmonic-mean ranking of relationships.
//!
//! A relationship's relevance combines how often each of its three
//! components (from node, edge, to node) was observed with how strongly the
//! source material emphasized it. Each component accumulates `count` (one
//! per merge) and `harmonic` (sum of reciprocal emphasis per merge), so
//! `count / harmonic` is the harmonic mean of the component's emphasis
//! values. Frequently seen, strongly emphasized components score high.

use std::cmp::Ordering;

use crate::graph::{Edge, RankedRelationship};

/// Score an edge as the arithmetic mean of `count / harmonic` over its from
/// node, the edge itself and its to node.
///
/// A component that has never been merged in its own right (harmonic still
/// zero) contributes 0.0, keeping every score finite and the sort order
/// total.
pub fn harmonic_score(edge: &Edge) -> f64 {
    let ratio = |count: u64, harmonic: f64| -> f64 {
        if harmonic > 0.0 {
            count as f64 / harmonic
        } else {
            0.0
        }
    };

    let total = ratio(edge.from.count, edge.from.harmonic)
        + ratio(edge.count, edge.harmonic)
        + ratio(edge.to.count, edge.to.harmonic);

    total / 3.0
}

/// Rank edges by harmonic score, highest first.
///
/// The sort is stable: edges with equal scores keep their input order, so
/// ranking the same sequence twice produces identical output.
pub fn rank_relationships(edges: Vec<Edge>) -> Vec<RankedRelationship> {
    let mut ranked: Vec<RankedRelationship> = edges
        .into_iter()
        .map(|edge| {
            let score = harmonic_score(&edge);
            RankedRelationship { edge, score }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    ranked
}
