//! Command dispatch.
//!
//! A command payload (the bytes between `<` and `>`) is tokenized, passed
//! through the registered filters, and routed by opcode to a handler in a
//! fixed 128-entry table. Handlers either reply synchronously, arm the
//! [`AsyncStash`] for a deferred programming reply, or reject the command,
//! which is answered with the generic `<X>` failure reply.

mod diag;
mod loco;
mod power;
mod prog;
mod registry;
mod system;

use std::io::Write;

use tracing::{debug, trace, warn};

use crate::config::ParserConfig;
use crate::diag::{DiagChannel, DiagFlags};
use crate::error::{CommandError, HandlerError, ParserError};
use crate::hardware::CommandStation;
use crate::hooks::{Command, CommandFilter, TransportHook};
use crate::reply::{ReplyRouter, ReplyTarget};
use crate::stash::{AsyncStash, CompletionKind};
use crate::tokenizer::{Params, split_values};

pub use loco::{accessory_address, dcc_speed, function_group};

/// What happened to one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Handled; any reply has been written.
    Completed,
    /// A programming operation was started. Its reply is written when the
    /// host calls [`Dispatcher::complete`] with this kind.
    Deferred(CompletionKind),
    /// Rejected; `<X>` has been written.
    Rejected(CommandError),
    /// A filter suppressed the command. Nothing was written.
    Suppressed,
    /// The payload was empty. Nothing was written.
    Empty,
}

/// How a handler finished.
enum Flow {
    Done,
    Deferred(CompletionKind),
}

type HandlerResult = Result<Flow, HandlerError>;
type Handler = fn(&mut Ctx<'_, '_>) -> HandlerResult;

/// Everything a handler may touch while running one command.
struct Ctx<'a, 'w> {
    opcode: u8,
    params: Params,
    raw: &'a [u8],
    reply: &'a mut ReplyTarget<'w>,
    station: &'a mut dyn CommandStation,
    stash: &'a mut AsyncStash,
    diag: &'a mut DiagFlags,
    config: &'a ParserConfig,
    transport: &'a mut Option<Box<dyn TransportHook>>,
}

impl Ctx<'_, '_> {
    fn param_count(&self) -> HandlerError {
        CommandError::ParamCount {
            opcode: self.opcode as char,
            count: self.params.len(),
        }
        .into()
    }

    fn diag_on(&self, channel: DiagChannel) -> bool {
        self.diag.is_on(channel)
    }
}

struct CommandEntry {
    opcode: u8,
    name: &'static str,
    handler: Handler,
}

const COMMANDS: &[CommandEntry] = &[
    CommandEntry { opcode: b'0', name: "power off", handler: power::power },
    CommandEntry { opcode: b'1', name: "power on", handler: power::power },
    CommandEntry { opcode: b't', name: "throttle", handler: loco::throttle },
    CommandEntry { opcode: b'f', name: "function group", handler: loco::function_bits },
    CommandEntry { opcode: b'F', name: "function", handler: loco::function },
    CommandEntry { opcode: b'a', name: "accessory", handler: loco::accessory },
    CommandEntry { opcode: b'-', name: "forget loco", handler: loco::forget },
    CommandEntry { opcode: b'!', name: "emergency stop", handler: loco::emergency_stop },
    CommandEntry { opcode: b'w', name: "write CV on main", handler: loco::write_cv_main },
    CommandEntry { opcode: b'b', name: "write CV bit on main", handler: loco::write_cv_bit_main },
    CommandEntry { opcode: b'T', name: "turnout", handler: registry::turnout },
    CommandEntry { opcode: b'Z', name: "output", handler: registry::output },
    CommandEntry { opcode: b'S', name: "sensor", handler: registry::sensor },
    CommandEntry { opcode: b'Q', name: "sensor states", handler: registry::sensor_states },
    CommandEntry { opcode: b'M', name: "raw packet main", handler: prog::raw_packet },
    CommandEntry { opcode: b'P', name: "raw packet prog", handler: prog::raw_packet },
    CommandEntry { opcode: b'W', name: "write CV", handler: prog::write_cv },
    CommandEntry { opcode: b'V', name: "verify CV", handler: prog::verify_cv },
    CommandEntry { opcode: b'B', name: "write CV bit", handler: prog::write_cv_bit },
    CommandEntry { opcode: b'R', name: "read CV", handler: prog::read_cv },
    CommandEntry { opcode: b'c', name: "current meter", handler: system::current },
    CommandEntry { opcode: b's', name: "status", handler: system::status },
    CommandEntry { opcode: b'E', name: "store EEPROM", handler: system::store },
    CommandEntry { opcode: b'e', name: "clear EEPROM", handler: system::clear },
    CommandEntry { opcode: b' ', name: "blank line", handler: system::blank },
    CommandEntry { opcode: b'#', name: "loco slots", handler: system::loco_slots },
    CommandEntry { opcode: b'+', name: "transport escape", handler: system::transport },
    CommandEntry { opcode: b'D', name: "diagnostics", handler: diag::diagnostic },
];

const fn build_table(specs: &[CommandEntry]) -> [Option<Handler>; 128] {
    let mut table: [Option<Handler>; 128] = [None; 128];
    let mut i = 0;
    while i < specs.len() {
        table[specs[i].opcode as usize] = Some(specs[i].handler);
        i += 1;
    }
    table
}

static HANDLERS: [Option<Handler>; 128] = build_table(COMMANDS);

/// The opcodes the dispatcher understands, with a short name for each.
pub fn commands() -> impl Iterator<Item = (char, &'static str)> {
    COMMANDS.iter().map(|c| (c.opcode as char, c.name))
}

/// Routes command payloads to handlers.
///
/// Owns the stash, the diagnostic flags and the hooks. One dispatcher
/// serves every client stream of a station.
pub struct Dispatcher {
    config: ParserConfig,
    stash: AsyncStash,
    diag: DiagFlags,
    filter: Option<Box<dyn CommandFilter>>,
    automation_filter: Option<Box<dyn CommandFilter>>,
    transport: Option<Box<dyn TransportHook>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl Dispatcher {
    /// A dispatcher with no hooks registered.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            stash: AsyncStash::new(),
            diag: DiagFlags::default(),
            filter: None,
            automation_filter: None,
            transport: None,
        }
    }

    /// Register the general command filter, replacing any previous one.
    pub fn set_filter(&mut self, filter: impl CommandFilter + 'static) {
        self.filter = Some(Box::new(filter));
    }

    /// Register the automation filter, which runs after the general filter
    /// and only for commands it did not suppress.
    pub fn set_automation_filter(&mut self, filter: impl CommandFilter + 'static) {
        self.automation_filter = Some(Box::new(filter));
    }

    /// Register the transport hook that receives `<+ ...>` commands.
    pub fn set_transport_hook(&mut self, hook: impl TransportHook + 'static) {
        self.transport = Some(Box::new(hook));
    }

    /// The active configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Diagnostic channels switched on by `<D ...>`.
    pub fn diag_flags(&self) -> DiagFlags {
        self.diag
    }

    /// The programming-operation stash.
    pub fn stash(&self) -> &AsyncStash {
        &self.stash
    }

    /// Parse and execute one command payload, writing any synchronous reply
    /// to `reply`.
    ///
    /// Leading `<` and spaces are skipped. A rejected command is answered
    /// with `<X>` and reported as [`Outcome::Rejected`]; only a failed write
    /// to `reply` is an error.
    pub fn dispatch(
        &mut self,
        reply: &mut ReplyTarget<'_>,
        payload: &[u8],
        station: &mut dyn CommandStation,
    ) -> Result<Outcome, ParserError> {
        let start = payload
            .iter()
            .position(|&b| b != b'<' && b != b' ')
            .unwrap_or(payload.len());
        let raw = &payload[start..];

        if self.diag.is_on(DiagChannel::Cmd) {
            debug!(command = %String::from_utf8_lossy(raw), "parsing command");
        }

        let mut command = Command {
            opcode: raw.first().copied().unwrap_or(0),
            params: split_values(raw),
        };
        let empty = command.is_suppressed();

        if let Some(filter) = self.filter.as_mut() {
            filter.filter(reply, &mut command);
        }
        if !command.is_suppressed()
            && let Some(filter) = self.automation_filter.as_mut()
        {
            filter.filter(reply, &mut command);
        }
        if command.is_suppressed() {
            trace!(empty, "nothing to dispatch");
            return Ok(if empty { Outcome::Empty } else { Outcome::Suppressed });
        }

        let handler = HANDLERS.get(usize::from(command.opcode)).copied().flatten();
        let result = match handler {
            Some(handler) => {
                let mut ctx = Ctx {
                    opcode: command.opcode,
                    params: command.params,
                    raw,
                    reply: &mut *reply,
                    station,
                    stash: &mut self.stash,
                    diag: &mut self.diag,
                    config: &self.config,
                    transport: &mut self.transport,
                };
                handler(&mut ctx)
            }
            None => {
                warn!(
                    opcode = %(command.opcode as char),
                    count = command.params.len(),
                    "unknown opcode"
                );
                for (i, v) in command.params.as_slice().iter().enumerate() {
                    warn!("p[{i}]={v} ({v:#x})");
                }
                Err(CommandError::UnknownOpcode(command.opcode as char).into())
            }
        };

        match result {
            Ok(Flow::Done) => Ok(Outcome::Completed),
            Ok(Flow::Deferred(kind)) => Ok(Outcome::Deferred(kind)),
            Err(HandlerError::Rejected(e)) => {
                debug!(opcode = %(command.opcode as char), error = %e, "command rejected");
                reply.write_all(b"<X>\n")?;
                Ok(Outcome::Rejected(e))
            }
            Err(HandlerError::Io(e)) => Err(ParserError::ReplyFailed(e)),
        }
    }

    /// Deliver the result of the pending programming operation.
    ///
    /// Writes the reply for `kind` to the client that armed the stash and
    /// frees the stash, even if the client has gone away or the write fails.
    pub fn complete(
        &mut self,
        kind: CompletionKind,
        result: i16,
        router: &mut dyn ReplyRouter,
    ) -> Result<(), ParserError> {
        let params = *self.stash.params().ok_or(ParserError::NoPendingOperation)?;
        trace!(?kind, result, "programming operation complete");
        let written = {
            let mut out = self.stash.resolve(&mut *router);
            kind.write_reply(&mut out, &params, result)
        };
        self.stash.release(router);
        written.map_err(ParserError::ReplyFailed)
    }
}
