//! Extension hooks.
//!
//! Filters see every parsed command before dispatch and may rewrite or
//! suppress it. The transport hook receives `<+ ...>` commands verbatim so a
//! network module can configure its modem.

use std::io::Write;

use crate::tokenizer::Params;

/// A parsed command as seen by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// The opcode byte; 0 means "do nothing".
    pub opcode: u8,
    /// The decimal/keyword parameters.
    pub params: Params,
}

impl Command {
    /// Stop this command from reaching the dispatcher.
    pub fn suppress(&mut self) {
        self.opcode = 0;
    }

    /// Whether a filter suppressed the command (or it was empty).
    pub fn is_suppressed(&self) -> bool {
        self.opcode == 0
    }
}

/// Inspects, rewrites, or suppresses commands before dispatch.
pub trait CommandFilter {
    /// Called once per command; `reply` is the issuing client's stream.
    fn filter(&mut self, reply: &mut dyn Write, command: &mut Command);
}

impl<F> CommandFilter for F
where
    F: FnMut(&mut dyn Write, &mut Command),
{
    fn filter(&mut self, reply: &mut dyn Write, command: &mut Command) {
        self(reply, command)
    }
}

/// Receives transport configuration escapes (`<+ ...>`).
pub trait TransportHook {
    /// `raw` is the whole command payload, opcode included.
    fn at_command(&mut self, raw: &[u8]);
}

impl<F> TransportHook for F
where
    F: FnMut(&[u8]),
{
    fn at_command(&mut self, raw: &[u8]) {
        self(raw)
    }
}
