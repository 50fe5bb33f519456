//! Extraction of typed graph events from model output.
//!
//! Models answer extraction prompts with newline delimited JSON. The parser
//! turns single lines into [`crate::events::GraphEvent`]s, the stream layer
//! reassembles lines from arbitrarily fragmented token streams, and the
//! extractor composes both with a generation service.

pub mod extractor;
pub mod parser;
pub mod stream;

pub use extractor::{schema_example, EntityExtractor, PromptTemplate};
pub use parser::{parse_event_line, parse_text, MalformedLine};
pub use stream::{extract_stream, Extraction};
