// file: src/ring.rs
// description: bounded FIFO history of recent envelopes

use crate::envelope::Envelope;
use std::collections::VecDeque;

/// Fixed-capacity event history. Oldest entries are evicted first; insertion
/// order is preserved across evictions. History survives reconnects — only
/// [`EventRing::clear`] resets it.
#[derive(Debug)]
pub struct EventRing {
    buf: VecDeque<Envelope>,
    capacity: usize,
    latest: Option<Envelope>,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            latest: None,
        }
    }

    /// Record an accepted envelope: replaces the latest-event pointer and
    /// appends to history, evicting the oldest entry at capacity.
    pub fn record(&mut self, envelope: Envelope) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.latest = Some(envelope.clone());
        self.buf.push_back(envelope);
    }

    pub fn latest(&self) -> Option<&Envelope> {
        self.latest.as_ref()
    }

    /// Snapshot of the buffered history, oldest first.
    pub fn snapshot(&self) -> Vec<Envelope> {
        self.buf.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Empty the history and drop the latest-event pointer. Connection state
    /// is not this type's concern and is unaffected.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EventKind;
    use serde_json::json;

    fn envelope(seq: u64) -> Envelope {
        Envelope::new(EventKind::Drift, json!({ "seq": seq }))
    }

    fn seqs(ring: &EventRing) -> Vec<u64> {
        ring.snapshot()
            .iter()
            .map(|e| e.data["seq"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn keeps_only_the_last_capacity_entries_in_order() {
        let mut ring = EventRing::new(5);
        for seq in 0..8 {
            ring.record(envelope(seq));
        }

        assert_eq!(ring.len(), 5);
        assert_eq!(seqs(&ring), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn latest_tracks_most_recent_insert() {
        let mut ring = EventRing::new(2);
        assert!(ring.latest().is_none());

        ring.record(envelope(1));
        ring.record(envelope(2));
        ring.record(envelope(3));
        assert_eq!(ring.latest().unwrap().data["seq"], 3);
    }

    #[test]
    fn clear_resets_history_and_latest() {
        let mut ring = EventRing::new(3);
        ring.record(envelope(1));
        ring.record(envelope(2));

        ring.clear();
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
        assert_eq!(ring.capacity(), 3);

        // Reusable after clearing.
        ring.record(envelope(9));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut ring = EventRing::new(1);
        for seq in 0..10 {
            ring.record(envelope(seq));
            assert!(ring.len() <= 1);
        }
        assert_eq!(seqs(&ring), vec![9]);
    }
}
