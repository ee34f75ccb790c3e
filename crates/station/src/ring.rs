//! In-memory reply transport for hosts with many clients.
//!
//! [`SharedRing`] multiplexes network clients over one output buffer, keyed
//! by routing tag. [`ClientTable`] adds plain per-client streams and resolves
//! deferred replies for the dispatcher.

use std::collections::BTreeMap;
use std::io::{self, Write};

use dccex_core::{ReplyRouter, RingStream, StreamId};

/// Output ring shared by tagged clients.
///
/// Bytes written after [`mark`](RingStream::mark) are staged for that tag and
/// only become visible to [`SharedRing::take`] once committed.
#[derive(Debug, Default)]
pub struct SharedRing {
    target: u8,
    staged: Vec<u8>,
    committed: BTreeMap<u8, Vec<u8>>,
}

impl SharedRing {
    /// An empty ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed output for `tag`, removing it from the ring.
    pub fn take(&mut self, tag: u8) -> Vec<u8> {
        self.committed.remove(&tag).unwrap_or_default()
    }

    /// Whether uncommitted bytes are staged.
    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }
}

impl Write for SharedRing {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staged.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RingStream for SharedRing {
    fn peek_target_mark(&self) -> u8 {
        self.target
    }

    fn mark(&mut self, tag: u8) {
        // Anything staged for the previous client is abandoned.
        self.staged.clear();
        self.target = tag;
    }

    fn commit(&mut self) {
        let bytes = std::mem::take(&mut self.staged);
        self.committed
            .entry(self.target)
            .or_default()
            .extend_from_slice(&bytes);
    }
}

/// Plain client streams plus the shared ring.
#[derive(Debug, Default)]
pub struct ClientTable {
    streams: BTreeMap<StreamId, Vec<u8>>,
    ring: SharedRing,
}

impl ClientTable {
    /// A table with no clients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain client stream.
    pub fn connect(&mut self, id: StreamId) {
        self.streams.entry(id).or_default();
    }

    /// Drop a client; deferred replies for it are discarded.
    pub fn disconnect(&mut self, id: StreamId) {
        self.streams.remove(&id);
    }

    /// Output written to a plain stream, removing it.
    pub fn take(&mut self, id: StreamId) -> Vec<u8> {
        self.streams
            .get_mut(&id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// The shared ring.
    pub fn ring_mut(&mut self) -> &mut SharedRing {
        &mut self.ring
    }
}

impl ReplyRouter for ClientTable {
    fn stream(&mut self, id: StreamId) -> Option<&mut dyn Write> {
        match self.streams.get_mut(&id) {
            Some(out) => Some(out),
            None => None,
        }
    }

    fn ring(&mut self) -> Option<&mut dyn RingStream> {
        Some(&mut self.ring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_publishes_per_tag() {
        let mut ring = SharedRing::new();
        ring.mark(3);
        ring.write_all(b"<O>\n").unwrap();
        assert!(ring.take(3).is_empty());
        ring.commit();
        ring.mark(4);
        ring.write_all(b"<X>\n").unwrap();
        ring.commit();
        assert_eq!(ring.take(3), b"<O>\n");
        assert_eq!(ring.take(4), b"<X>\n");
        assert!(ring.take(3).is_empty());
    }

    #[test]
    fn remark_abandons_staged_bytes() {
        let mut ring = SharedRing::new();
        ring.mark(1);
        ring.write_all(b"partial").unwrap();
        assert!(ring.has_staged());
        ring.mark(2);
        assert!(!ring.has_staged());
        assert_eq!(ring.peek_target_mark(), 2);
    }

    #[test]
    fn table_routes_connected_streams_only() {
        let mut table = ClientTable::new();
        table.connect(StreamId(1));
        assert!(table.stream(StreamId(2)).is_none());
        table.stream(StreamId(1)).unwrap().write_all(b"hi").unwrap();
        assert_eq!(table.take(StreamId(1)), b"hi");
        table.disconnect(StreamId(1));
        assert!(table.stream(StreamId(1)).is_none());
    }
}
