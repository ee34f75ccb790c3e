//! The single-slot stash for acknowledged programming operations.
//!
//! A programming-track command arms the stash with the issuing client's
//! route and the command's parameters. The operation finishes later, and the
//! host reports it with a [`CompletionKind`] and a result code; the stash
//! then resolves the route and formats the client's reply.

use std::io::{self, Write};

use tracing::trace;

use crate::reply::{ReplyRoute, ReplyRouter, RingStream};
use crate::tokenizer::Params;

/// The stash already holds an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a programming operation is already in progress")]
pub struct StashBusy;

/// Which programming operation finished, selecting the reply format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompletionKind {
    /// `<W cv value callbacknum callbacksub>`.
    WriteByte,
    /// `<B cv bit value callbacknum callbacksub>`.
    WriteBit,
    /// `<V cv bit value>`.
    VerifyBit,
    /// `<V cv value>`.
    VerifyByte,
    /// `<R cv callbacknum callbacksub>`.
    ReadByte,
    /// `<R>`.
    ReadLocoId,
    /// `<W id>`.
    WriteLocoId,
}

impl CompletionKind {
    /// Write the reply for this kind given the armed parameters and the
    /// operation's result code.
    pub fn write_reply(self, out: &mut dyn Write, p: &Params, result: i16) -> io::Result<()> {
        match self {
            CompletionKind::WriteByte => {
                let value = if result == 1 { p[1] } else { -1 };
                writeln!(out, "<r{}|{}|{} {}>", p[2], p[3], p[0], value)
            }
            CompletionKind::WriteBit => {
                let value = if result == 1 { p[2] } else { -1 };
                writeln!(out, "<r{}|{}|{} {} {}>", p[3], p[4], p[0], p[1], value)
            }
            CompletionKind::VerifyBit => writeln!(out, "<v {} {} {}>", p[0], p[1], result),
            CompletionKind::VerifyByte => writeln!(out, "<v {} {}>", p[0], result),
            CompletionKind::ReadByte => {
                writeln!(out, "<r{}|{}|{} {}>", p[1], p[2], p[0], result)
            }
            CompletionKind::ReadLocoId => writeln!(out, "<r {result}>"),
            CompletionKind::WriteLocoId => {
                let value = if result == 1 { p[0] } else { result };
                writeln!(out, "<w {value}>")
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    route: ReplyRoute,
    params: Params,
}

/// Holds at most one in-flight programming operation.
#[derive(Debug, Default)]
pub struct AsyncStash {
    pending: Option<Pending>,
}

impl AsyncStash {
    /// An empty stash.
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Whether an operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Capture `route` and `params` for a new operation.
    pub fn arm(&mut self, route: ReplyRoute, params: &Params) -> Result<(), StashBusy> {
        if self.pending.is_some() {
            return Err(StashBusy);
        }
        trace!(?route, ?params, "stash armed");
        self.pending = Some(Pending {
            route,
            params: *params,
        });
        Ok(())
    }

    /// Parameters of the in-flight operation.
    pub fn params(&self) -> Option<&Params> {
        self.pending.as_ref().map(|p| &p.params)
    }

    /// Route of the in-flight operation.
    pub fn route(&self) -> Option<ReplyRoute> {
        self.pending.as_ref().map(|p| p.route)
    }

    /// Writer for the captured route. A ring is marked with the captured
    /// tag first. The reply is dropped if the route no longer resolves.
    pub fn resolve<'r>(&self, router: &'r mut dyn ReplyRouter) -> PendingReply<'r> {
        match self.route() {
            Some(ReplyRoute::Stream(id)) => match router.stream(id) {
                Some(writer) => PendingReply::Stream(writer),
                None => PendingReply::Dropped,
            },
            Some(ReplyRoute::Ring { tag }) => match router.ring() {
                Some(ring) => {
                    ring.mark(tag);
                    PendingReply::Ring(ring)
                }
                None => PendingReply::Dropped,
            },
            None => PendingReply::Dropped,
        }
    }

    /// Commit a ring reply if one was routed, then empty the slot.
    pub fn release(&mut self, router: &mut dyn ReplyRouter) {
        if let Some(ReplyRoute::Ring { .. }) = self.route() {
            if let Some(ring) = router.ring() {
                ring.commit();
            }
        }
        trace!("stash released");
        self.pending = None;
    }
}

/// Destination of a deferred reply.
pub enum PendingReply<'r> {
    /// A plain client stream.
    Stream(&'r mut dyn Write),
    /// The multiplexed ring, marked for the captured client.
    Ring(&'r mut dyn RingStream),
    /// The client is gone; output is discarded.
    Dropped,
}

impl Write for PendingReply<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PendingReply::Stream(w) => w.write(buf),
            PendingReply::Ring(r) => r.write(buf),
            PendingReply::Dropped => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PendingReply::Stream(w) => w.flush(),
            PendingReply::Ring(r) => r.flush(),
            PendingReply::Dropped => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{SingleStream, StreamId};

    fn reply(kind: CompletionKind, params: &[i16], result: i16) -> String {
        let mut out = Vec::new();
        kind.write_reply(&mut out, &Params::from_slice(params), result)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_reply_formats() {
        assert_eq!(
            reply(CompletionKind::WriteByte, &[5, 9, 100, 2], 1),
            "<r100|2|5 9>\n"
        );
        assert_eq!(
            reply(CompletionKind::WriteByte, &[5, 9], 0),
            "<r0|0|5 -1>\n"
        );
        assert_eq!(
            reply(CompletionKind::WriteBit, &[1, 2, 1, 7, 8], 1),
            "<r7|8|1 2 1>\n"
        );
        assert_eq!(
            reply(CompletionKind::WriteBit, &[1, 2, 1, 7, 8], -1),
            "<r7|8|1 2 -1>\n"
        );
        assert_eq!(reply(CompletionKind::VerifyBit, &[29, 5, 1], 0), "<v 29 5 0>\n");
        assert_eq!(reply(CompletionKind::VerifyByte, &[1, 3], 3), "<v 1 3>\n");
        assert_eq!(
            reply(CompletionKind::ReadByte, &[8, 10, 11], 145),
            "<r10|11|8 145>\n"
        );
        assert_eq!(reply(CompletionKind::ReadLocoId, &[], 1234), "<r 1234>\n");
        assert_eq!(reply(CompletionKind::WriteLocoId, &[77], 1), "<w 77>\n");
        assert_eq!(reply(CompletionKind::WriteLocoId, &[77], -1), "<w -1>\n");
    }

    #[test]
    fn test_arm_busy_release() {
        let mut stash = AsyncStash::new();
        let params = Params::from_slice(&[1, 2]);
        stash.arm(ReplyRoute::Stream(StreamId(1)), &params).unwrap();
        assert!(stash.is_busy());
        assert_eq!(
            stash.arm(ReplyRoute::Stream(StreamId(2)), &params),
            Err(StashBusy)
        );
        assert_eq!(stash.route(), Some(ReplyRoute::Stream(StreamId(1))));

        let mut out = Vec::new();
        let mut router = SingleStream::new(StreamId(1), &mut out);
        stash.resolve(&mut router).write_all(b"<v 1 2>\n").unwrap();
        stash.release(&mut router);
        assert!(!stash.is_busy());
        assert_eq!(out, b"<v 1 2>\n");
    }

    #[test]
    fn test_unresolvable_route_drops_reply() {
        let mut stash = AsyncStash::new();
        stash
            .arm(ReplyRoute::Ring { tag: 3 }, &Params::new())
            .unwrap();
        let mut out = Vec::new();
        let mut router = SingleStream::new(StreamId(0), &mut out);
        let mut pending = stash.resolve(&mut router);
        assert!(matches!(pending, PendingReply::Dropped));
        pending.write_all(b"lost").unwrap();
        stash.release(&mut router);
        assert!(out.is_empty());
        assert!(!stash.is_busy());
    }
}
