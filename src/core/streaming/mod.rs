//! Streaming response machinery
//!
//! Pure bytes-to-deltas pipeline, unit-testable without any HTTP: a growable
//! ring buffer, a frame parser for the SSE and JSON-lines wire framings, and
//! the assembler that normalizes framed events into `Delta`s through a
//! provider adapter.

pub mod decode;
pub mod parser;
pub mod ring;

pub use decode::DeltaAssembler;
pub use parser::{Framing, StreamEvent, StreamParser};
pub use ring::RingBuffer;
