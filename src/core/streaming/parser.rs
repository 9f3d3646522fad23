//! Stream event framing
//!
//! Splits an arbitrarily fragmented byte stream into complete wire events.
//! SSE framing separates events on the blank line (`\n\n`), collects `data:`
//! payload lines (multiple `data:` lines concatenate with `\n`, as the SSE
//! spec requires) and retains `event:`/`id:` fields; comment and keep-alive
//! lines are dropped. JSON-lines framing treats each newline-terminated line
//! as one event payload.

use crate::core::error::Result;
use crate::core::streaming::ring::RingBuffer;

/// Wire framing for a streamed response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `text/event-stream`, events separated by a blank line.
    Sse,
    /// Newline-delimited JSON objects.
    JsonLines,
}

impl Framing {
    fn delimiter(self) -> &'static [u8] {
        match self {
            Framing::Sse => b"\n\n",
            Framing::JsonLines => b"\n",
        }
    }
}

/// One complete framed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// `event:` field, when the upstream sent one.
    pub event: Option<String>,
    /// `id:` field, when the upstream sent one.
    pub id: Option<String>,
    /// Payload (the joined `data:` lines for SSE, the whole line for
    /// JSON-lines).
    pub data: String,
}

/// Incremental frame splitter over a ring buffer.
#[derive(Debug)]
pub struct StreamParser {
    ring: RingBuffer,
    framing: Framing,
}

impl StreamParser {
    pub fn new(framing: Framing) -> Self {
        Self {
            ring: RingBuffer::new(),
            framing,
        }
    }

    /// Parser with explicit buffer limits (the ceiling bounds a single
    /// unframed event).
    pub fn with_limits(framing: Framing, initial: usize, max_capacity: usize) -> Self {
        Self {
            ring: RingBuffer::with_limits(initial, max_capacity),
            framing,
        }
    }

    /// Buffer incoming bytes and return every event completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<StreamEvent>> {
        self.ring.write(bytes)?;

        let mut events = Vec::new();
        while let Some(frame) = self.ring.read_until(self.framing.delimiter()) {
            if let Some(event) = self.parse_frame(&frame) {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush the final, delimiter-less frame after the transport closes.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let tail = self.ring.drain();
        if tail.is_empty() {
            return None;
        }
        self.parse_frame(&tail)
    }

    fn parse_frame(&self, frame: &[u8]) -> Option<StreamEvent> {
        let text = String::from_utf8_lossy(frame);
        match self.framing {
            Framing::JsonLines => {
                let line = text.trim();
                if line.is_empty() {
                    return None;
                }
                Some(StreamEvent {
                    event: None,
                    id: None,
                    data: line.to_string(),
                })
            }
            Framing::Sse => {
                let mut event = None;
                let mut id = None;
                let mut data_lines: Vec<&str> = Vec::new();

                for line in text.split('\n') {
                    let line = line.strip_suffix('\r').unwrap_or(line);
                    if let Some(payload) = strip_field(line, "data:") {
                        data_lines.push(payload);
                    } else if let Some(name) = strip_field(line, "event:") {
                        event = Some(name.to_string());
                    } else if let Some(value) = strip_field(line, "id:") {
                        id = Some(value.to_string());
                    }
                    // Lines starting with ':' are comments / keep-alives.
                }

                // An event without data never produces a delta on its own.
                if data_lines.is_empty() {
                    return None;
                }

                Some(StreamEvent {
                    event,
                    id,
                    data: data_lines.join("\n"),
                })
            }
        }
    }
}

/// Strip an SSE field prefix plus the optional single leading space.
fn strip_field<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RelayError;

    fn feed_all(parser: &mut StreamParser, input: &[u8]) -> Vec<StreamEvent> {
        parser.feed(input).unwrap()
    }

    // ==================== SSE framing ====================

    #[test]
    fn test_single_event() {
        let mut parser = StreamParser::new(Framing::Sse);
        let events = feed_all(&mut parser, b"data: {\"x\":1}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"x\":1}");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn test_multiple_data_lines_concatenate_with_newline() {
        let mut parser = StreamParser::new(Framing::Sse);
        let events = feed_all(&mut parser, b"data: line one\ndata: line two\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn test_event_and_id_fields_retained() {
        let mut parser = StreamParser::new(Framing::Sse);
        let events = feed_all(
            &mut parser,
            b"event: message_delta\nid: 42\ndata: {\"y\":2}\n\n",
        );

        assert_eq!(events[0].event.as_deref(), Some("message_delta"));
        assert_eq!(events[0].id.as_deref(), Some("42"));
        assert_eq!(events[0].data, "{\"y\":2}");
    }

    #[test]
    fn test_comment_only_event_is_dropped() {
        let mut parser = StreamParser::new(Framing::Sse);
        let events = feed_all(&mut parser, b": keep-alive\n\nevent: ping\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_crlf_lines_tolerated() {
        let mut parser = StreamParser::new(Framing::Sse);
        let events = feed_all(&mut parser, b"data: hi\r\n\ndata: there\r\n\n");

        // `\r\n\n` still frames on the final blank line.
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "hi");
        assert_eq!(events[1].data, "there");
    }

    #[test]
    fn test_fragmented_feeding_matches_whole_feeding() {
        let input = b"data: one\n\nevent: e\ndata: two\ndata: three\n\n: ping\n\ndata: four\n\n";

        let mut whole = StreamParser::new(Framing::Sse);
        let whole_events = feed_all(&mut whole, input);

        let mut fragmented = StreamParser::new(Framing::Sse);
        let mut fragmented_events = Vec::new();
        for &byte in input.iter() {
            fragmented_events.extend(fragmented.feed(&[byte]).unwrap());
        }

        assert_eq!(whole_events, fragmented_events);
        assert_eq!(whole_events.len(), 3);
    }

    #[test]
    fn test_finish_flushes_trailing_frame() {
        let mut parser = StreamParser::new(Framing::Sse);
        assert!(feed_all(&mut parser, b"data: no trailing delimiter").is_empty());

        let tail = parser.finish().unwrap();
        assert_eq!(tail.data, "no trailing delimiter");
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_oversized_event_overflows() {
        let mut parser = StreamParser::with_limits(Framing::Sse, 8, 32);
        let err = parser.feed(&[b'x'; 64]).unwrap_err();
        assert!(matches!(err, RelayError::BufferOverflow { limit: 32 }));
    }

    // ==================== JSON-lines framing ====================

    #[test]
    fn test_json_lines_framing() {
        let mut parser = StreamParser::new(Framing::JsonLines);
        let events = feed_all(&mut parser, b"{\"done\":false}\n{\"done\":true}\n");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"done\":false}");
        assert_eq!(events[1].data, "{\"done\":true}");
    }

    #[test]
    fn test_json_lines_final_line_without_newline() {
        let mut parser = StreamParser::new(Framing::JsonLines);
        assert!(feed_all(&mut parser, b"{\"done\":true}").is_empty());
        assert_eq!(parser.finish().unwrap().data, "{\"done\":true}");
    }

    #[test]
    fn test_json_lines_blank_lines_skipped() {
        let mut parser = StreamParser::new(Framing::JsonLines);
        let events = feed_all(&mut parser, b"\n\n{\"a\":1}\n\n");
        assert_eq!(events.len(), 1);
    }
}
