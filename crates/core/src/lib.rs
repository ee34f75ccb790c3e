//! DCC-EX command protocol core library.
//!
//! Turns the `<opcode params...>` text protocol spoken by throttles and
//! control software into calls on a command station, and writes the
//! protocol's replies back to the issuing client. The main entry points are
//! [`CommandFramer::poll`] for reading commands off a stream,
//! [`Dispatcher::dispatch`] for executing one payload, and
//! [`Dispatcher::complete`] for delivering programming-track results.
//!
//! The station itself is supplied by the host through the
//! [`CommandStation`] family of traits.

#![warn(missing_docs)]

/// Parser configuration.
pub mod config;
/// Diagnostic channel flags.
pub mod diag;
/// Opcode routing and command handlers.
pub mod dispatch;
/// Typed error types.
pub mod error;
/// `<...>` framing over byte streams.
pub mod framer;
/// Collaborator traits implemented by the host station.
pub mod hardware;
/// Command filters and the transport hook.
pub mod hooks;
/// Keyword hashing and the well-known keyword values.
pub mod keyword;
/// Reply targets and deferred-reply routing.
pub mod reply;
/// Single-slot stash for programming operations.
pub mod stash;
/// Decimal/keyword and hex parameter tokenizers.
pub mod tokenizer;

// ── Convenience re-exports ──────────────────────────────────────────────────

// Dispatch
pub use dispatch::{Dispatcher, Outcome};

// Framing
pub use framer::{CommandFramer, Step};

// Configuration
pub use config::ParserConfig;

// Errors
pub use error::{CommandError, HexError, ParserError};

// Collaborators
pub use hardware::{
    CommandStation, CurrentReading, EepromCounts, EepromStore, LocoControl, OutputInfo,
    OutputRegistry, PowerMode, ProgrammingTrack, SensorChange, SensorInfo, SensorRegistry,
    SystemControl, Track, TrackControl, TurnoutInfo, TurnoutKind, TurnoutRegistry,
};

// Hooks
pub use hooks::{Command, CommandFilter, TransportHook};

// Replies
pub use reply::{ReplyRoute, ReplyRouter, ReplyTarget, RingStream, SingleStream, StreamId};

// Stash
pub use stash::{AsyncStash, CompletionKind, StashBusy};

// Tokenizers
pub use keyword::keyword_hash;
pub use tokenizer::{MAX_COMMAND_PARAMS, Params, split_hex_values, split_values};
