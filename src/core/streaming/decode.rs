//! Byte stream to normalized delta conversion
//!
//! `DeltaAssembler` couples the frame parser with a provider adapter's event
//! decoder and enforces the stream contract: deltas come out in arrival
//! order, exactly one final delta is emitted, the `[DONE]` sentinel becomes a
//! synthetic final, and a single malformed event is logged and dropped
//! without failing the stream.

use std::sync::Arc;

use crate::core::error::Result;
use crate::core::providers::ProviderAdapter;
use crate::core::streaming::parser::StreamParser;
use crate::core::types::Delta;

/// Terminal sentinel used by the OpenAI-compatible SSE convention.
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug)]
pub struct DeltaAssembler {
    parser: StreamParser,
    adapter: Arc<ProviderAdapter>,
    done: bool,
}

impl DeltaAssembler {
    pub fn new(adapter: Arc<ProviderAdapter>) -> Self {
        Self {
            parser: StreamParser::new(adapter.framing()),
            adapter,
            done: false,
        }
    }

    /// Whether the final delta has been emitted; later input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed transport bytes and collect every delta they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Delta>> {
        if self.done {
            return Ok(Vec::new());
        }

        let events = self.parser.feed(bytes)?;
        let mut deltas = Vec::new();
        for event in events {
            if self.done {
                break;
            }
            self.decode_payload(&event.data, &mut deltas);
        }
        Ok(deltas)
    }

    /// Flush after a clean transport close.
    ///
    /// Processes any delimiter-less tail and, if the upstream never sent its
    /// terminal marker, appends the synthetic final delta so the stream
    /// invariant holds even for keep-alive-only streams.
    pub fn finish(&mut self) -> Vec<Delta> {
        let mut deltas = Vec::new();

        if !self.done {
            if let Some(event) = self.parser.finish() {
                self.decode_payload(&event.data, &mut deltas);
            }
        }

        if !self.done {
            self.done = true;
            deltas.push(Delta::finished());
        }

        deltas
    }

    fn decode_payload(&mut self, payload: &str, out: &mut Vec<Delta>) {
        if payload == DONE_SENTINEL {
            self.done = true;
            out.push(Delta::finished());
            return;
        }

        match self.adapter.decode_stream_event(payload) {
            Ok(Some(delta)) => {
                if delta.is_final {
                    self.done = true;
                }
                out.push(delta);
            }
            Ok(None) => {}
            Err(error) => {
                tracing::debug!(
                    provider = self.adapter.name(),
                    %error,
                    "dropping malformed stream event"
                );
            }
        }
    }
}
