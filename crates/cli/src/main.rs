mod render;
mod telemetry;

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dccex_core::keyword::keyword_name;
use dccex_core::{
    CommandFramer, Dispatcher, HexError, Outcome, Params, SingleStream, StreamId, dispatch,
    keyword_hash, split_hex_values, split_values,
};
use dccex_station::{Layout, MemoryStation, load_layout_from_str};
use serde::Serialize;
use tracing::debug;

use crate::render::{Format, RunStats, outcome_label, print_summary, render_hex_error};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "dccex",
    version,
    about = "DCC-EX command front end: replay command streams and inspect the protocol"
)]
struct Cli {
    /// Output mode: "pretty" for terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Log more (-v debug, -vv trace). Logs go to stderr.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Replay a command stream against an in-memory station.
    Run {
        /// File holding `<...>` commands. Reads stdin when omitted or "-".
        input: Option<String>,
        /// Layout JSON describing the station's turnouts, outputs, sensors
        /// and programming-track decoder.
        #[arg(long)]
        layout: Option<String>,
    },

    /// Compute the keyword hash of each argument.
    Hash {
        #[arg(required = true)]
        keywords: Vec<String>,
    },

    /// Tokenize one command payload, opcode first (e.g. "t 3 50 1").
    Tokenize {
        command: String,
        /// Parse operands as hex bytes, as raw packet commands do.
        #[arg(long)]
        hex: bool,
    },

    /// List the opcodes the dispatcher understands.
    Opcodes,
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let format = Format::resolve_or_detect(cli.output.as_deref());

    let result = telemetry::init(cli.verbose).and_then(|()| match cli.cmd {
        Cmd::Run { input, layout } => cmd_run(input.as_deref(), layout.as_deref(), format),
        Cmd::Hash { keywords } => cmd_hash(&keywords, format),
        Cmd::Tokenize { command, hex } => cmd_tokenize(&command, hex, format),
        Cmd::Opcodes => cmd_opcodes(format),
    });

    if let Err(err) = result {
        report_failure(&err, format);
        process::exit(1);
    }
}

/// Report a command failure: a JSON envelope on stdout, or a message on
/// stderr.
fn report_failure(err: &anyhow::Error, format: Format) {
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "success": false,
                "error": "command_failed",
                "message": format!("{err:#}"),
            });
            println!("{out}");
        }
        Format::Pretty => eprintln!("error: {err:#}"),
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── run ─────────────────────────────────────────────────────────────────

/// Console stream for a replay: scripted input, captured replies.
struct Replay {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
}

impl Replay {
    fn new(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            output: Vec::new(),
        }
    }
}

impl Read for Replay {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Replay {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct TranscriptEntry {
    command: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    reply: String,
}

fn load_layout(path: Option<&str>) -> Result<Layout> {
    let Some(path) = path else {
        return Ok(Layout::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read layout '{path}'"))?;
    let layout =
        load_layout_from_str(&text).with_context(|| format!("failed to load layout '{path}'"))?;
    debug!(path, id = %layout.id, "layout loaded");
    Ok(layout)
}

fn read_input(path: Option<&str>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != "-" => {
            fs::read(path).with_context(|| format!("failed to read input '{path}'"))
        }
        _ => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn cmd_run(input: Option<&str>, layout_path: Option<&str>, format: Format) -> Result<()> {
    let layout = load_layout(layout_path)?;
    let bytes = read_input(input)?;

    let mut station = MemoryStation::from_layout(&layout);
    let mut dispatcher = Dispatcher::new(layout.parser.clone());
    let mut framer = CommandFramer::with_config(StreamId::CONSOLE, &layout.parser);
    let mut console = Replay::new(bytes);

    let mut stats = RunStats::default();
    let mut transcript = Vec::new();
    let mut stdout = io::stdout().lock();

    while let Some(outcome) = framer.poll(&mut console, &mut dispatcher, &mut station)? {
        stats.record(&outcome);
        let mut reply = std::mem::take(&mut console.output);

        // Programming operations finish on the next tick.
        if let Some((kind, result)) = station.tick() {
            let mut router = SingleStream::new(StreamId::CONSOLE, &mut reply);
            dispatcher.complete(kind, result, &mut router)?;
        }

        match format {
            Format::Pretty => stdout.write_all(&reply)?,
            Format::Json => transcript.push(TranscriptEntry {
                command: String::from_utf8_lossy(framer.payload()).into_owned(),
                outcome: outcome_label(&outcome),
                error: match &outcome {
                    Outcome::Rejected(err) => Some(err.to_string()),
                    _ => None,
                },
                reply: String::from_utf8_lossy(&reply).into_owned(),
            }),
        }
    }

    match format {
        Format::Pretty => {
            stdout.flush()?;
            print_summary(&stats);
        }
        Format::Json => print_json(&serde_json::json!({
            "commands": transcript,
            "summary": stats,
        }))?,
    }
    Ok(())
}

// ── hash ────────────────────────────────────────────────────────────────

fn cmd_hash(keywords: &[String], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let out: Vec<_> = keywords
                .iter()
                .map(|k| {
                    let hash = keyword_hash(k);
                    serde_json::json!({
                        "keyword": k,
                        "hash": hash,
                        "known": keyword_name(hash),
                    })
                })
                .collect();
            print_json(&out)?;
        }
        Format::Pretty => {
            for k in keywords {
                let hash = keyword_hash(k);
                match keyword_name(hash) {
                    Some(name) => println!("{k}: {hash} ({name})"),
                    None => println!("{k}: {hash}"),
                }
            }
        }
    }
    Ok(())
}

// ── tokenize ────────────────────────────────────────────────────────────

fn cmd_tokenize(command: &str, hex: bool, format: Format) -> Result<()> {
    let payload = command.trim().trim_start_matches('<');
    let params = if hex {
        match split_hex_values(payload.as_bytes()) {
            Ok(params) => params,
            Err(err) => {
                hex_failure(payload, &err, format);
                process::exit(1);
            }
        }
    } else {
        split_values(payload.as_bytes())
    };
    print_params(payload, &params, hex, format)
}

fn hex_failure(payload: &str, err: &HexError, format: Format) {
    match format {
        Format::Json => {
            let HexError::InvalidDigit { digit, offset } = *err;
            let out = serde_json::json!({
                "success": false,
                "error": "invalid_hex",
                "message": err.to_string(),
                "digit": digit.to_string(),
                "offset": offset,
            });
            println!("{out}");
        }
        Format::Pretty => render_hex_error(payload, err),
    }
}

fn print_params(payload: &str, params: &Params, hex: bool, format: Format) -> Result<()> {
    let opcode = payload.chars().next();
    match format {
        Format::Json => {
            let keywords: Vec<_> = params
                .as_slice()
                .iter()
                .map(|v| if hex { None } else { keyword_name(*v) })
                .collect();
            print_json(&serde_json::json!({
                "opcode": opcode.map(String::from),
                "count": params.len(),
                "params": params.as_slice(),
                "keywords": keywords,
            }))?;
        }
        Format::Pretty => {
            if let Some(opcode) = opcode {
                println!("opcode: {opcode}");
            }
            for (i, v) in params.as_slice().iter().enumerate() {
                match (hex, keyword_name(*v)) {
                    (true, _) => println!("p[{i}] = {v:#04x}"),
                    (false, Some(name)) => println!("p[{i}] = {v} ({name})"),
                    (false, None) => println!("p[{i}] = {v}"),
                }
            }
        }
    }
    Ok(())
}

// ── opcodes ─────────────────────────────────────────────────────────────

fn cmd_opcodes(format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let out: Vec<_> = dispatch::commands()
                .map(|(opcode, name)| serde_json::json!({ "opcode": opcode.to_string(), "name": name }))
                .collect();
            print_json(&out)?;
        }
        Format::Pretty => {
            for (opcode, name) in dispatch::commands() {
                println!("<{opcode}>  {name}");
            }
        }
    }
    Ok(())
}
