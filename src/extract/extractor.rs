use futures_util::stream::BoxStream;
use std::sync::Arc;

use crate::error::Result;
use crate::events::GraphEvent;
use crate::extract::parser::{parse_text, MalformedLine};
use crate::extract::stream::{extract_stream, Extraction};
use crate::llm::GenerationService;

/// The expected-schema description handed to the model: one example entity
/// record and one example relationship record, as the parser accepts them.
pub fn schema_example() -> String {
    concat!(
        r#"{"is":"entity","name":"entity name","types":["instance type","..."],"emphasis":9}"#,
        "\n",
        r#"{"is":"relationship","from":"entity name","to":"entity name","type":"relationship type","emphasis":5}"#,
    )
    .to_string()
}

/// An extraction prompt with `{input}`, `{format}` and `{source}`
/// placeholders.
///
/// The template text itself is host-supplied configuration; this type only
/// performs the substitution. `{format}` and `{source}` are optional in the
/// text, `{input}` is where the content under extraction goes.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitute the placeholders. `{input}` is replaced last so raw
    /// content that happens to contain placeholder text stays literal.
    pub fn render(&self, input: &str, format: &str, source: &str) -> String {
        self.template
            .replace("{format}", format)
            .replace("{source}", source)
            .replace("{input}", input)
    }
}

/// Runs extraction prompts against a generation service and parses the
/// model's newline delimited JSON answer into graph events.
pub struct EntityExtractor {
    service: Arc<dyn GenerationService>,
    template: PromptTemplate,
    source: String,
}

impl EntityExtractor {
    /// Create a new extractor.
    ///
    /// `source` labels where the content came from; it is substituted into
    /// the prompt so the model can attribute the text.
    pub fn new(
        service: Arc<dyn GenerationService>,
        template: PromptTemplate,
        source: impl Into<String>,
    ) -> Self {
        Self {
            service,
            template,
            source: source.into(),
        }
    }

    /// Extract from `input` in one round trip: generate the whole response,
    /// then parse it. Returns the events and the malformed lines.
    pub async fn invoke(&self, input: &str) -> Result<(Vec<GraphEvent>, Vec<MalformedLine>)> {
        let prompt = self.template.render(input, &schema_example(), &self.source);
        let output = self.service.generate(&prompt).await?;

        let (events, malformed) = parse_text(&output);
        log::debug!(
            "Extracted {} events ({} malformed lines) from {} response bytes",
            events.len(),
            malformed.len(),
            output.len()
        );

        Ok((events, malformed))
    }

    /// Extract from `input` incrementally: stream the model response and
    /// yield each extraction as soon as its line is complete.
    pub async fn stream(
        &self,
        input: &str,
    ) -> Result<BoxStream<'static, Result<Extraction>>> {
        let prompt = self.template.render(input, &schema_example(), &self.source);
        let fragments = self.service.generate_stream(&prompt).await?;

        Ok(Box::pin(extract_stream(fragments)))
    }
}
