use async_stream::stream;
use futures_util::{Stream, StreamExt};

use crate::error::Result;
use crate::events::GraphEvent;
use crate::extract::parser::{parse_event_line, MalformedLine};

/// One item of an extraction stream.
///
/// Malformed lines travel inside the stream as data; the `Err` channel is
/// reserved for source failures, which end the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Event(GraphEvent),
    Malformed(MalformedLine),
}

/// Convert a stream of response fragments into a stream of extractions.
///
/// Fragments are appended to a line buffer. Whenever the buffer holds a
/// newline, everything before it is taken as a complete line: trimmed,
/// skipped when blank, otherwise parsed with recovery. The partial line
/// after the last newline stays buffered until more input arrives; once the
/// source ends, a remaining non-blank buffer is parsed under the same rule.
///
/// Emission order is input order, and the result is independent of how the
/// source text was fragmented: any fragmentation of the same text yields
/// the same extraction sequence.
pub fn extract_stream<S>(fragments: S) -> impl Stream<Item = Result<Extraction>>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    stream! {
        let mut fragments = fragments;
        let mut buffer = String::new();

        while let Some(fragment) = fragments.next().await {
            let fragment = match fragment {
                Ok(f) => f,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            buffer.push_str(&fragment);

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);

                if line.is_empty() {
                    continue;
                }

                match parse_event_line(&line) {
                    Ok(event) => yield Ok(Extraction::Event(event)),
                    Err(bad) => yield Ok(Extraction::Malformed(bad)),
                }
            }
        }

        let tail = buffer.trim().to_string();
        if !tail.is_empty() {
            match parse_event_line(&tail) {
                Ok(event) => yield Ok(Extraction::Event(event)),
                Err(bad) => yield Ok(Extraction::Malformed(bad)),
            }
        }
    }
}
