//! `<...>` command framer -- byte-level state machine for one client stream.
//!
//! Clients send commands as `<payload>`. Bytes outside a frame (CR, LF,
//! stray text) are ignored. Each call to [`CommandFramer::poll`] consumes
//! available bytes until one command has been dispatched or the stream has
//! nothing more to offer, then reports sensor changes to the client.

use std::io::{ErrorKind, Read, Write};

use tracing::{debug, trace};

use crate::config::ParserConfig;
use crate::diag::DiagChannel;
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::ParserError;
use crate::hardware::CommandStation;
use crate::reply::{ReplyTarget, StreamId};

/// Start-of-command delimiter.
const START: u8 = b'<';
/// End-of-command delimiter.
const END: u8 = b'>';

/// Internal state of the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    /// Skipping bytes until `<`.
    WaitingForStart,
    /// Inside a frame -- collecting bytes until `>`.
    ReadingPayload,
}

/// Result of feeding one byte to the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep feeding bytes.
    Continue,
    /// A complete payload is available from [`CommandFramer::payload`].
    Complete,
    /// The payload outgrew the buffer and was discarded.
    Overflow,
}

/// Per-stream command assembler.
#[derive(Debug)]
pub struct CommandFramer {
    id: StreamId,
    state: FrameState,
    buffer: Vec<u8>,
    max_buffer: usize,
}

impl CommandFramer {
    /// Framer for stream `id` holding payloads of up to `max_buffer` bytes.
    pub fn new(id: StreamId, max_buffer: usize) -> Self {
        Self {
            id,
            state: FrameState::WaitingForStart,
            buffer: Vec::with_capacity(max_buffer),
            max_buffer,
        }
    }

    /// Framer sized from the parser configuration.
    pub fn with_config(id: StreamId, config: &ParserConfig) -> Self {
        Self::new(id, config.max_buffer)
    }

    /// The stream this framer serves.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Whether a partial command is buffered.
    pub fn in_payload(&self) -> bool {
        self.state == FrameState::ReadingPayload
    }

    /// The payload assembled so far (complete after [`Step::Complete`]).
    pub fn payload(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop any partial command.
    pub fn flush(&mut self) {
        self.buffer.clear();
        self.state = FrameState::WaitingForStart;
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Step {
        match (self.state, byte) {
            (_, START) => {
                self.buffer.clear();
                self.state = FrameState::ReadingPayload;
                Step::Continue
            }
            (FrameState::WaitingForStart, _) => Step::Continue,
            (FrameState::ReadingPayload, END) => {
                self.state = FrameState::WaitingForStart;
                Step::Complete
            }
            (FrameState::ReadingPayload, _) => {
                if self.buffer.len() >= self.max_buffer {
                    self.flush();
                    return Step::Overflow;
                }
                self.buffer.push(byte);
                Step::Continue
            }
        }
    }

    /// Consume bytes from `stream` until one command is dispatched or the
    /// stream has nothing available, then write pending sensor changes.
    ///
    /// A read returning `Ok(0)`, `WouldBlock` or `TimedOut` ends the poll.
    /// Returns the outcome of the dispatched command, if any.
    pub fn poll<S>(
        &mut self,
        stream: &mut S,
        dispatcher: &mut Dispatcher,
        station: &mut dyn CommandStation,
    ) -> Result<Option<Outcome>, ParserError>
    where
        S: Read + Write,
    {
        let mut dispatched = Ok(None);
        let mut byte = [0u8; 1];

        loop {
            match stream.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {}
                Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break;
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParserError::ReadFailed(e)),
            }

            match self.push(byte[0]) {
                Step::Continue => {}
                Step::Overflow => {
                    if dispatcher.diag_flags().is_on(DiagChannel::Cmd) {
                        debug!(stream = self.id.0, max = self.max_buffer, "buffer flushed");
                    }
                }
                Step::Complete => {
                    trace!(stream = self.id.0, len = self.buffer.len(), "command framed");
                    let mut reply = ReplyTarget::stream(self.id, stream);
                    dispatched = dispatcher
                        .dispatch(&mut reply, &self.buffer, &mut *station)
                        .map(Some);
                    break;
                }
            }
        }

        // Sensors are checked after every poll, even when the reply failed.
        let reported = station.sensor_changes().iter().try_for_each(|change| {
            let tag = if change.active { 'Q' } else { 'q' };
            writeln!(stream, "<{} {}>", tag, change.id)
        });
        let outcome = dispatched?;
        reported?;
        Ok(outcome)
    }
}
