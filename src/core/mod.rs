//! Core engine
//!
//! Components, leaves first: provider adapters (`providers`), the circuit
//! breaker (`breaker`), health tracking (`health`), chain selection
//! (`router`), the streaming pipeline (`streaming`) and the retry executor
//! (`executor`). The executor is the only component with scheduler
//! responsibility; everything below it is a per-call or per-provider state
//! machine.

pub mod breaker;
pub mod error;
pub mod executor;
pub mod health;
pub mod providers;
pub mod router;
pub mod streaming;
pub mod types;
