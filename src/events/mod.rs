//! Typed graph events produced by the extraction parser.
//!
//! Events arrive from the model as newline delimited JSON objects tagged with
//! an `is` field. The parser validates each record and normalizes the raw
//! 0-10 emphasis to (0, 1] before an event is constructed, so every event in
//! the system carries an emphasis that is safe to take a reciprocal of.

/// A validated record extracted from model output.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A named entity with zero or more type labels.
    Entity {
        name: String,
        types: Vec<String>,
        emphasis: f64,
    },
    /// A directed relationship between two named entities.
    Relationship {
        from: String,
        to: String,
        rel_type: String,
        emphasis: f64,
    },
}

impl GraphEvent {
    /// Normalized emphasis in (0, 1].
    pub fn emphasis(&self) -> f64 {
        match self {
            GraphEvent::Entity { emphasis, .. } => *emphasis,
            GraphEvent::Relationship { emphasis, .. } => *emphasis,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, GraphEvent::Entity { .. })
    }
}
