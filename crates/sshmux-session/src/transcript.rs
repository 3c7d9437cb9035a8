//! Transcript ring plus live fan-out.
//!
//! Entries and sinks live behind one lock so that snapshot-and-subscribe is
//! atomic: a new viewer's replay is always a chronological prefix of the
//! live stream it then observes.

use std::collections::VecDeque;

use crate::types::{EventSink, SessionEvent, TranscriptEntry};

pub struct Transcript {
    entries: VecDeque<TranscriptEntry>,
    capacity: usize,
    sinks: Vec<Box<dyn EventSink>>,
}

impl Transcript {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            sinks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store an entry in the ring and forward it to live sinks.
    pub fn append(&mut self, entry: TranscriptEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        self.publish(&SessionEvent::Output(entry));
    }

    /// Fan an event out to live sinks without storing it. A sink that is
    /// dead or fails delivery is removed, never retried.
    pub fn publish(&mut self, event: &SessionEvent) {
        self.sinks.retain(|sink| sink.is_alive() && sink.deliver(event));
    }

    /// Register a sink and return the replay snapshot, atomically.
    pub fn attach(&mut self, sink: Box<dyn EventSink>) -> Vec<TranscriptEntry> {
        let snapshot = self.snapshot();
        self.sinks.push(sink);
        snapshot
    }

    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}
