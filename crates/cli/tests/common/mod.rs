//! Shared helpers for `dccex` CLI tests.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

use assert_cmd::cargo;

pub fn dccex_cmd() -> Command {
    Command::new(cargo::cargo_bin!("dccex"))
}

/// Write `content` to `name` inside a fresh temp dir.
pub fn write_temp(name: &str, content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write temp file");
    (dir, path.to_string_lossy().to_string())
}

pub fn run_with_stdin(args: &[&str], stdin_body: &str) -> Output {
    let mut child = dccex_cmd()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn dccex command");

    {
        let stdin = child.stdin.as_mut().expect("stdin handle");
        // The child may exit before reading stdin (e.g. on a startup error).
        if let Err(e) = stdin.write_all(stdin_body.as_bytes()) {
            assert!(
                e.kind() == std::io::ErrorKind::BrokenPipe,
                "write stdin body: {e}"
            );
        }
    }

    child.wait_with_output().expect("wait for dccex command")
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid json ({e}): {stdout}"))
}
