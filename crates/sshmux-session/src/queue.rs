//! Bounded FIFO of pending command requests (one per session).
//!
//! The queue is pure data: it never completes requests itself. Drain and
//! rejection return the affected requests so the coordinator can fire
//! completions, update the gating ledger, and publish events outside the
//! lock.

use sshmux_core::Source;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::types::CommandRequest;

/// FIFO with a hard capacity and a staleness bound enforced at drain time.
#[derive(Debug)]
pub struct CommandQueue {
    items: VecDeque<CommandRequest>,
    capacity: usize,
    staleness: Duration,
}

/// Result of one drain step: the next runnable request, plus any requests
/// that sat past the staleness bound and must be failed with `Expired`.
#[derive(Debug, Default)]
pub struct Drained {
    pub next: Option<CommandRequest>,
    pub expired: Vec<CommandRequest>,
}

impl CommandQueue {
    pub fn new(capacity: usize, staleness: Duration) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(16)),
            capacity,
            staleness,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Append a request. Callers check `is_full` first (under the session
    /// mutex) so this can only fail on a logic error.
    pub fn enqueue(&mut self, req: CommandRequest) -> std::result::Result<(), CommandRequest> {
        if self.is_full() {
            return Err(req);
        }
        self.items.push_back(req);
        Ok(())
    }

    /// Remove and return the head, skipping stale entries.
    pub fn drain_one(&mut self, now: Instant) -> Drained {
        let mut drained = Drained::default();
        while let Some(req) = self.items.pop_front() {
            if req.age(now) > self.staleness {
                drained.expired.push(req);
                continue;
            }
            drained.next = Some(req);
            break;
        }
        drained
    }

    /// Remove every pending request; used on disconnect and recovery reset.
    pub fn reject_all(&mut self) -> Vec<CommandRequest> {
        self.items.drain(..).collect()
    }

    /// Remove only requests from `source`; used by the assistant-scoped
    /// cancel.
    pub fn reject_source(&mut self, source: Source) -> Vec<CommandRequest> {
        let mut rejected = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for req in self.items.drain(..) {
            if req.source == source {
                rejected.push(req);
            } else {
                kept.push_back(req);
            }
        }
        self.items = kept;
        rejected
    }
}
