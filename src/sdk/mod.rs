//! Host-facing SDK surface

pub mod client;

pub use client::{Relay, RelayBuilder};
