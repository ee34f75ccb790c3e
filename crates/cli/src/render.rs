//! Terminal rendering for the CLI.
//!
//! Pretty output goes to the terminal with colour; JSON output is for pipes
//! and scripts. Tokenizer errors are rendered as ariadne reports pointing at
//! the offending byte of the command.

use std::io::{self, IsTerminal};

use ariadne::{Color, Config, Fmt, Label, Report, ReportKind, Source};
use dccex_core::{HexError, Outcome};
use serde::Serialize;

// ── Output format ───────────────────────────────────────────────────────

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Human-readable, coloured output.
    Pretty,
    /// Machine-readable JSON.
    Json,
}

impl Format {
    /// Use the explicit choice, or pick by whether stdout is a TTY.
    pub(crate) fn resolve_or_detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("json") => Format::Json,
            Some("pretty") => Format::Pretty,
            _ => {
                if io::stdout().is_terminal() {
                    Format::Pretty
                } else {
                    Format::Json
                }
            }
        }
    }
}

// ── Outcomes ────────────────────────────────────────────────────────────

/// Short machine-readable label for a dispatch outcome.
pub(crate) fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Completed => "completed",
        Outcome::Deferred(_) => "deferred",
        Outcome::Rejected(_) => "rejected",
        Outcome::Suppressed => "suppressed",
        Outcome::Empty => "empty",
    }
}

/// Per-outcome command counts for a replayed stream.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub(crate) struct RunStats {
    pub(crate) completed: usize,
    pub(crate) deferred: usize,
    pub(crate) rejected: usize,
    pub(crate) suppressed: usize,
    pub(crate) empty: usize,
}

impl RunStats {
    pub(crate) fn record(&mut self, outcome: &Outcome) {
        let slot = match outcome {
            Outcome::Completed => &mut self.completed,
            Outcome::Deferred(_) => &mut self.deferred,
            Outcome::Rejected(_) => &mut self.rejected,
            Outcome::Suppressed => &mut self.suppressed,
            Outcome::Empty => &mut self.empty,
        };
        *slot += 1;
    }

    fn total(&self) -> usize {
        self.completed + self.deferred + self.rejected + self.suppressed + self.empty
    }
}

/// Print a coloured summary line to stderr.
///
/// Example: `12 commands, 1 deferred, 2 rejected`
pub(crate) fn print_summary(stats: &RunStats) {
    let total = stats.total();
    let s = if total == 1 { "" } else { "s" };
    let mut parts = vec![format!("{total} command{s}")];
    if stats.deferred > 0 {
        parts.push(format!(
            "{}",
            format!("{} deferred", stats.deferred).fg(Color::Blue)
        ));
    }
    if stats.rejected > 0 {
        parts.push(format!(
            "{}",
            format!("{} rejected", stats.rejected).fg(Color::Red)
        ));
    }
    if stats.suppressed > 0 {
        parts.push(format!(
            "{}",
            format!("{} suppressed", stats.suppressed).fg(Color::Yellow)
        ));
    }
    eprintln!("{}", parts.join(", "));
}

// ── Tokenizer errors ────────────────────────────────────────────────────

/// Render a hex tokenizer error against the command text, to stderr.
pub(crate) fn render_hex_error(command: &str, err: &HexError) {
    let HexError::InvalidDigit { offset, .. } = err;
    let name = "<command>";
    let start = (*offset).min(command.len());
    let end = (start + 1).min(command.len()).max(start);

    Report::build(ReportKind::Error, (name, start..end))
        .with_message(err.to_string())
        .with_config(Config::default().with_compact(false))
        .with_label(
            Label::new((name, start..end))
                .with_message("not a hex digit")
                .with_color(Color::Red),
        )
        .with_help("packet bytes are hex pairs separated by spaces")
        .finish()
        .eprint((name, Source::from(command)))
        .ok();
}
