//! Typed error types for the command front end.

use std::io;

/// Failure of the hex tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// A byte that is neither a hex digit nor a separator.
    #[error("invalid hex digit {digit:?} at offset {offset}")]
    InvalidDigit {
        /// The offending character.
        digit: char,
        /// Offset of the byte within the command payload.
        offset: usize,
    },
}

/// Why a command was rejected.
///
/// Every variant is answered on the wire with the generic `<X>` reply; the
/// variant itself is only visible to the host through
/// [`Outcome::Rejected`](crate::Outcome::Rejected) and the log.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// No handler is registered for the opcode.
    #[error("unknown opcode {0:?}")]
    UnknownOpcode(char),

    /// The handler does not accept this many parameters.
    #[error("'{opcode}' does not accept {count} parameters")]
    ParamCount {
        /// Opcode of the rejected command.
        opcode: char,
        /// Number of parameters received.
        count: usize,
    },

    /// A parameter value is outside its valid range.
    #[error("{what} out of range: {value}")]
    OutOfRange {
        /// Which parameter was checked.
        what: &'static str,
        /// The received value.
        value: i16,
    },

    /// A keyword parameter was not one the handler recognises.
    #[error("unrecognised keyword value {0}")]
    UnknownKeyword(i16),

    /// A programming-track operation is already in flight.
    #[error("programming track busy")]
    StashBusy,

    /// No registry entry with this id.
    #[error("no object with id {0}")]
    NotFound(i16),

    /// The registry refused to create the object.
    #[error("registry refused to create id {0}")]
    RegistryRefused(i16),

    /// A listing command found nothing to list.
    #[error("nothing to list")]
    NothingToList,

    /// Raw packet operands were not valid hex.
    #[error(transparent)]
    Hex(#[from] HexError),

    /// A raw packet command carried no packet bytes.
    #[error("empty packet")]
    EmptyPacket,

    /// A transport escape arrived with no transport hook registered.
    #[error("no transport hook registered")]
    NoTransportHook,

    /// The command ran but the protocol answers it with a failure reply.
    #[error("command does not acknowledge")]
    Unacknowledged,

    /// A restart was requested but the station kept running.
    #[error("restart request returned")]
    RestartFailed,
}

/// Errors surfaced to the host driving the parser.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    /// Writing a reply to the client stream failed.
    #[error("reply write failed: {0}")]
    ReplyFailed(#[from] io::Error),

    /// Reading from the client stream failed.
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),

    /// A completion was delivered while no operation was pending.
    #[error("completion delivered with no pending programming operation")]
    NoPendingOperation,
}

/// Internal handler result: a command rejection or a reply write failure.
#[derive(Debug)]
pub(crate) enum HandlerError {
    Rejected(CommandError),
    Io(io::Error),
}

impl From<CommandError> for HandlerError {
    fn from(e: CommandError) -> Self {
        HandlerError::Rejected(e)
    }
}

impl From<HexError> for HandlerError {
    fn from(e: HexError) -> Self {
        HandlerError::Rejected(CommandError::Hex(e))
    }
}

impl From<io::Error> for HandlerError {
    fn from(e: io::Error) -> Self {
        HandlerError::Io(e)
    }
}
