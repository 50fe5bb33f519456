pub mod config;
pub mod error;
pub mod db;
pub mod events;
pub mod extract;
pub mod llm;
pub mod index;
pub mod graph;
pub mod pipeline;

pub use config::Config;
pub use error::{GraphRagError, Result};
pub use events::GraphEvent;
pub use pipeline::{IngestReport, Pipeline};
