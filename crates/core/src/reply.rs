//! Reply routing.
//!
//! Synchronous replies go straight to the [`ReplyTarget`] handed to the
//! dispatcher. Deferred replies (programming-track results) are written
//! later, so the stash keeps only a [`ReplyRoute`] and asks a
//! [`ReplyRouter`] for the writer when the result arrives.

use std::io::{self, Write};

/// Host-assigned identifier of a plain client stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamId(pub u8);

impl StreamId {
    /// The local console (USB serial) stream.
    ///
    /// Turnout state changes are echoed to the console by the turnout
    /// registry itself, so the dispatcher does not acknowledge them there.
    pub const CONSOLE: StreamId = StreamId(0);
}

/// A shared output channel serving several logical clients.
///
/// Each reply is written after marking the ring with the tag of the client
/// it belongs to, and committed once complete so partial replies from
/// different clients never interleave.
pub trait RingStream: Write {
    /// Tag of the client currently marked for output.
    fn peek_target_mark(&self) -> u8;
    /// Direct subsequent output to the client with `tag`.
    fn mark(&mut self, tag: u8);
    /// Publish everything written since the last mark.
    fn commit(&mut self);
}

/// Where a command's synchronous reply goes.
pub enum ReplyTarget<'a> {
    /// A plain stream owned by a single client.
    Stream {
        /// Identifier used to route deferred replies back here.
        id: StreamId,
        /// The stream writer.
        writer: &'a mut dyn Write,
    },
    /// A multiplexed ring, already marked for the issuing client.
    Ring(&'a mut dyn RingStream),
}

impl<'a> ReplyTarget<'a> {
    /// Plain stream target.
    pub fn stream(id: StreamId, writer: &'a mut dyn Write) -> Self {
        ReplyTarget::Stream { id, writer }
    }

    /// Multiplexed ring target.
    pub fn ring(ring: &'a mut dyn RingStream) -> Self {
        ReplyTarget::Ring(ring)
    }

    /// The route a deferred reply to this target must take.
    pub fn route(&self) -> ReplyRoute {
        match self {
            ReplyTarget::Stream { id, .. } => ReplyRoute::Stream(*id),
            ReplyTarget::Ring(ring) => ReplyRoute::Ring {
                tag: ring.peek_target_mark(),
            },
        }
    }

    /// Whether this target is the local console.
    pub fn is_console(&self) -> bool {
        matches!(self, ReplyTarget::Stream { id, .. } if *id == StreamId::CONSOLE)
    }
}

impl Write for ReplyTarget<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ReplyTarget::Stream { writer, .. } => writer.write(buf),
            ReplyTarget::Ring(ring) => ring.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ReplyTarget::Stream { writer, .. } => writer.flush(),
            ReplyTarget::Ring(ring) => ring.flush(),
        }
    }
}

/// Captured destination of a deferred reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplyRoute {
    /// A plain client stream.
    Stream(StreamId),
    /// The multiplexed ring, for the client with this tag.
    Ring {
        /// Routing tag captured when the operation was armed.
        tag: u8,
    },
}

/// Resolves captured routes back to writers when a deferred reply is due.
pub trait ReplyRouter {
    /// Writer for a plain stream, or `None` if it has gone away.
    fn stream(&mut self, id: StreamId) -> Option<&mut dyn Write>;
    /// The multiplexed ring, if the host has one.
    fn ring(&mut self) -> Option<&mut dyn RingStream>;
}

/// Router for hosts with a single plain stream and no ring.
pub struct SingleStream<'a> {
    id: StreamId,
    writer: &'a mut dyn Write,
}

impl<'a> SingleStream<'a> {
    /// Route replies for `id` to `writer`.
    pub fn new(id: StreamId, writer: &'a mut dyn Write) -> Self {
        Self { id, writer }
    }
}

impl ReplyRouter for SingleStream<'_> {
    fn stream(&mut self, id: StreamId) -> Option<&mut dyn Write> {
        if id == self.id {
            Some(&mut *self.writer)
        } else {
            None
        }
    }

    fn ring(&mut self) -> Option<&mut dyn RingStream> {
        None
    }
}
