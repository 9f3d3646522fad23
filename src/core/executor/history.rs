//! Bounded attempt history
//!
//! Append-mostly diagnostics ring shared by all executor tasks. Concurrent
//! appends preserve the bound by dropping the oldest entry.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::core::error::ErrorKind;
use crate::core::providers::ProviderId;

/// Maximum retained attempts.
pub const HISTORY_CAP: usize = 100;

/// How one attempt ended.
///
/// `Cancelled` covers attempts torn down by racing or caller cancellation; it
/// is accounted for here but never folded into health statistics, because it
/// was not a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Retryable(ErrorKind),
    Fatal(ErrorKind),
    Cancelled,
}

/// One HTTP round trip to one provider for one request intent.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub provider: ProviderId,
    /// Unix milliseconds.
    pub started_ts: u64,
    /// Unix milliseconds.
    pub ended_ts: u64,
    pub outcome: AttemptOutcome,
}

/// Drop-oldest ring of recent attempts.
#[derive(Debug)]
pub struct AttemptHistory {
    inner: Mutex<VecDeque<Attempt>>,
    cap: usize,
}

impl AttemptHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, attempt: Attempt) {
        let mut inner = self.inner.lock();
        if inner.len() == self.cap {
            inner.pop_front();
        }
        inner.push_back(attempt);
    }

    /// Retained attempts, oldest first.
    pub fn recent(&self) -> Vec<Attempt> {
        self.inner.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for AttemptHistory {
    fn default() -> Self {
        Self::new()
    }
}
