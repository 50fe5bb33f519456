//! Knowledge graph module: node/edge model, identifier normalization,
//! event upsert, harmonic ranking and retrieval expansion.

pub mod expand;
pub mod rank;
pub mod store;
pub mod upsert;

pub use expand::{ExpandOptions, Expander};
pub use rank::{harmonic_score, rank_relationships};
pub use store::{GraphStore, SqliteGraphStore};
pub use upsert::{Persisted, UpsertEngine};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A graph node keyed by its normalized identifier.
///
/// `count` and `harmonic` accumulate when the node is merged as an entity
/// in its own right. A node first seen as a relationship endpoint starts at
/// `count` 1 with `harmonic` 0: observed once, with no emphasis evidence
/// until an entity event mentions it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub labels: Vec<String>,
    pub count: u64,
    pub harmonic: f64,
}

/// A directed edge, unique per (from, to, rel_type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: Node,
    pub to: Node,
    pub rel_type: String,
    pub count: u64,
    pub harmonic: f64,
}

impl fmt::Display for Edge {
    /// Renders the edge as a `FROM TYPE TO;` triple.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {};", self.from.name, self.rel_type, self.to.name)
    }
}

/// An edge paired with its harmonic-mean score.
#[derive(Debug, Clone)]
pub struct RankedRelationship {
    pub edge: Edge,
    pub score: f64,
}

/// Normalize a raw name into a graph identifier.
///
/// Strips every character outside `[A-Za-z0-9 ._-]`, folds the separators
/// `-`, `.` and space into `_`, uppercases the result, and prefixes `_` when
/// the result would otherwise start with a digit. Idempotent: normalizing an
/// already-normalized identifier returns it unchanged.
pub fn normalize_name(input: &str) -> String {
    let strip = Regex::new(r"[^A-Za-z0-9 ._-]").expect("Invalid regex pattern");
    let fold = Regex::new(r"[-. ]").expect("Invalid regex pattern");

    let stripped = strip.replace_all(input, "");
    let output = fold.replace_all(&stripped, "_").to_uppercase();

    if output.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("_{}", output)
    } else {
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_name("Apollo 11"), "APOLLO_11");
        assert_eq!(normalize_name("landed on"), "LANDED_ON");
        assert_eq!(normalize_name("Moon"), "MOON");
    }

    #[test]
    fn test_normalize_strips_disallowed() {
        assert_eq!(normalize_name("C++ (language)"), "C_LANGUAGE");
        assert_eq!(normalize_name("a/b\\c"), "ABC");
    }

    #[test]
    fn test_normalize_folds_separators() {
        assert_eq!(normalize_name("a-b.c d"), "A_B_C_D");
    }

    #[test]
    fn test_normalize_digit_prefix() {
        assert_eq!(normalize_name("3M"), "_3M");
        assert_eq!(normalize_name("11 Downing Street"), "_11_DOWNING_STREET");
    }

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize_name("Apollo 11!");
        let twice = normalize_name(&once);
        assert_eq!(once, twice);

        let once = normalize_name("3M Company");
        let twice = normalize_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_can_be_empty() {
        assert_eq!(normalize_name("!!!"), "");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_edge_display() {
        let node = |name: &str| Node {
            name: name.to_string(),
            labels: vec![],
            count: 0,
            harmonic: 0.0,
        };
        let edge = Edge {
            from: node("APOLLO_11"),
            to: node("MOON"),
            rel_type: "LANDED_ON".to_string(),
            count: 1,
            harmonic: 1.25,
        };
        assert_eq!(edge.to_string(), "APOLLO_11 LANDED_ON MOON;");
    }
}
