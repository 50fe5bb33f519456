use serde::Deserialize;

use crate::events::GraphEvent;
use crate::graph::normalize_name;

/// Highest raw emphasis a record may carry.
const EMPHASIS_MAX: f64 = 10.0;

/// A line that could not be parsed into a graph event, with the reason.
///
/// Malformed lines are expected output of language models, not failures:
/// they are collected alongside the events and never abort a parse.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedLine {
    pub line: String,
    pub reason: String,
}

/// Wire form of a record as the model emits it.
#[derive(Deserialize)]
#[serde(tag = "is", rename_all = "lowercase")]
enum RawRecord {
    Entity {
        name: String,
        types: Vec<String>,
        emphasis: f64,
    },
    Relationship {
        from: String,
        to: String,
        #[serde(rename = "type")]
        rel_type: String,
        emphasis: f64,
    },
}

/// Parse one line of model output into a validated graph event.
///
/// Parsing happens in two stages. The syntax stage parses the line as JSON;
/// on failure it retries exactly once with the final character removed,
/// because models sometimes append a stray closing brace. The validation
/// stage then checks the record shape, requires every name-like field to
/// normalize to a non-empty identifier, requires a finite raw emphasis in
/// (0, 10], and scales the emphasis to (0, 1]. Shape and validation
/// failures are not retried.
pub fn parse_event_line(line: &str) -> std::result::Result<GraphEvent, MalformedLine> {
    let line = line.trim();

    let malformed = |reason: String| MalformedLine {
        line: line.to_string(),
        reason,
    };

    let value = parse_json(line).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    let raw: RawRecord = serde_json::from_value(value)
        .map_err(|e| malformed(format!("invalid record: {}", e)))?;

    validate(raw).map_err(malformed)
}

/// Parse a whole response at once.
///
/// Splits on newlines and applies the same per-line rule as the streaming
/// parser: trim, skip blank lines, parse with recovery. Returns the events
/// and the malformed lines as a pair, both in input order.
pub fn parse_text(text: &str) -> (Vec<GraphEvent>, Vec<MalformedLine>) {
    let mut events = Vec::new();
    let mut malformed = Vec::new();

    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_event_line(line) {
            Ok(event) => events.push(event),
            Err(bad) => malformed.push(bad),
        }
    }

    (events, malformed)
}

fn parse_json(line: &str) -> serde_json::Result<serde_json::Value> {
    match serde_json::from_str(line) {
        Ok(value) => Ok(value),
        Err(_) => {
            // Sometimes the model likes to add an extra '}'.
            let mut chars = line.chars();
            chars.next_back();
            serde_json::from_str(chars.as_str())
        }
    }
}

fn validate(raw: RawRecord) -> std::result::Result<GraphEvent, String> {
    match raw {
        RawRecord::Entity {
            name,
            types,
            emphasis,
        } => {
            let emphasis = normalize_emphasis(emphasis)?;
            check_name("name", &name)?;
            for t in &types {
                check_name("types", t)?;
            }
            Ok(GraphEvent::Entity {
                name,
                types,
                emphasis,
            })
        }
        RawRecord::Relationship {
            from,
            to,
            rel_type,
            emphasis,
        } => {
            let emphasis = normalize_emphasis(emphasis)?;
            check_name("from", &from)?;
            check_name("to", &to)?;
            check_name("type", &rel_type)?;
            Ok(GraphEvent::Relationship {
                from,
                to,
                rel_type,
                emphasis,
            })
        }
    }
}

fn normalize_emphasis(raw: f64) -> std::result::Result<f64, String> {
    if !raw.is_finite() {
        return Err("emphasis must be a finite number".to_string());
    }
    if raw <= 0.0 || raw > EMPHASIS_MAX {
        return Err(format!("emphasis must be in (0, 10], got {}", raw));
    }
    Ok(raw / EMPHASIS_MAX)
}

fn check_name(field: &str, value: &str) -> std::result::Result<(), String> {
    if normalize_name(value).is_empty() {
        return Err(format!(
            "{} '{}' normalizes to an empty identifier",
            field, value
        ));
    }
    Ok(())
}
