//! Fuzz smoke tests for the tokenizers, framer and dispatcher.
//!
//! Random and adversarial payloads must never panic, and the parameter
//! lists they produce must keep their shape: at most `MAX_COMMAND_PARAMS`
//! values, with every slot past the count left at zero.
//!
//! A simple deterministic PRNG provides reproducible randomness.

mod common;

use common::RecordingStation;
use dccex_core::{
    CommandFramer, Dispatcher, HexError, MAX_COMMAND_PARAMS, Outcome, Params, ReplyTarget,
    SingleStream, StreamId, Step, dispatch, split_hex_values, split_values,
};

// ─── Simple deterministic PRNG (LCG) ────────────────────────────────────────

struct SimpleRng(u64);

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range(&mut self, max: usize) -> usize {
        ((self.next() >> 33) as usize) % max
    }

    fn gen_bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| (self.next() >> 33) as u8).collect()
    }
}

// ─── Payload generation ─────────────────────────────────────────────────────

const DIGITS: &[u8] = b"0123456789";
const LETTERS: &[u8] = b"ABCDEFJMNOPRSTabcdefx";
const HEX: &[u8] = b"0123456789abcdefABCDEF";
const PUNCT: &[u8] = b"-  <>\0|,";

/// A payload built from opcodes, numbers, keywords and separators.
fn gen_payload(rng: &mut SimpleRng, opcodes: &[u8]) -> Vec<u8> {
    let mut out = vec![opcodes[rng.gen_range(opcodes.len())]];
    let tokens = rng.gen_range(14);
    for _ in 0..tokens {
        out.push(b' ');
        let (alphabet, max_len) = match rng.gen_range(5) {
            0 | 1 => (DIGITS, 7),
            2 => (LETTERS, 9),
            3 => (HEX, 4),
            _ => (PUNCT, 2),
        };
        if rng.gen_range(4) == 0 {
            out.push(b'-');
        }
        for _ in 0..=rng.gen_range(max_len) {
            out.push(alphabet[rng.gen_range(alphabet.len())]);
        }
    }
    out
}

fn opcodes() -> Vec<u8> {
    let mut ops: Vec<u8> = dispatch::commands().map(|(op, _)| op as u8).collect();
    ops.extend_from_slice(b"~?z\0<>");
    ops
}

// ─── Invariant checking ─────────────────────────────────────────────────────

fn assert_shape(params: &Params, input: &[u8]) {
    assert!(
        params.len() <= MAX_COMMAND_PARAMS,
        "count {} over limit for {:?}",
        params.len(),
        String::from_utf8_lossy(input),
    );
    assert!(
        params.slots()[params.len()..].iter().all(|&v| v == 0),
        "trailing slots not zero for {:?}: {:?}",
        String::from_utf8_lossy(input),
        params.slots(),
    );
}

fn check_tokenizers(input: &[u8]) {
    assert_shape(&split_values(input), input);
    match split_hex_values(input) {
        Ok(params) => assert_shape(&params, input),
        Err(HexError::InvalidDigit { digit, offset }) => {
            assert!(offset >= 1 && offset < input.len(), "offset {offset} out of bounds");
            assert_eq!(input[offset] as char, digit);
            assert!(!digit.is_ascii_hexdigit() && !matches!(digit, ' ' | '>' | '\0'));
        }
    }
}

/// Dispatch `input` and check the reply agrees with the outcome.
fn check_dispatch(d: &mut Dispatcher, s: &mut RecordingStation, input: &[u8]) {
    let mut out = Vec::new();
    let outcome = d
        .dispatch(&mut ReplyTarget::stream(StreamId(1), &mut out), input, s)
        .expect("writes to a Vec never fail");
    match outcome {
        Outcome::Rejected(_) => assert!(
            out.ends_with(b"<X>\n"),
            "rejected {:?} without <X>: {:?}",
            String::from_utf8_lossy(input),
            String::from_utf8_lossy(&out),
        ),
        Outcome::Deferred(kind) => {
            assert!(out.is_empty());
            assert!(d.stash().is_busy());
            let mut reply = Vec::new();
            d.complete(kind, -1, &mut SingleStream::new(StreamId(1), &mut reply))
                .unwrap();
            assert!(!d.stash().is_busy());
            assert!(reply.ends_with(b">\n"));
        }
        Outcome::Empty | Outcome::Suppressed => assert!(out.is_empty()),
        Outcome::Completed => {}
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[test]
fn fuzz_structured_payloads() {
    let ops = opcodes();
    let mut rng = SimpleRng::new(0xDCC_E0);
    let mut d = Dispatcher::default();
    let mut s = RecordingStation::new();
    for _ in 0..20_000 {
        let payload = gen_payload(&mut rng, &ops);
        check_tokenizers(&payload);
        check_dispatch(&mut d, &mut s, &payload);
        s.calls.clear();
    }
}

#[test]
fn fuzz_random_bytes() {
    let mut rng = SimpleRng::new(42);
    let mut d = Dispatcher::default();
    let mut s = RecordingStation::new();
    for _ in 0..5_000 {
        let len = rng.gen_range(64);
        let payload = rng.gen_bytes(len);
        check_tokenizers(&payload);
        check_dispatch(&mut d, &mut s, &payload);
        s.calls.clear();
    }
}

#[test]
fn fuzz_framer_stays_bounded() {
    let ops = opcodes();
    let mut rng = SimpleRng::new(7);
    let mut framer = CommandFramer::new(StreamId(1), 24);
    for _ in 0..5_000 {
        let mut chunk = vec![b'<'];
        chunk.extend(gen_payload(&mut rng, &ops));
        chunk.push(b'>');
        if rng.gen_range(3) == 0 {
            chunk.extend(rng.gen_bytes(8));
        }
        for b in chunk {
            let step = framer.push(b);
            assert!(framer.payload().len() <= 24);
            if step == Step::Complete {
                check_tokenizers(framer.payload());
            }
        }
    }
}

#[test]
fn long_runs_of_values_stop_at_limit() {
    let mut payload = b"M".to_vec();
    for i in 0..40 {
        payload.extend_from_slice(format!(" {i}").as_bytes());
    }
    let params = split_values(&payload);
    assert_eq!(params.len(), MAX_COMMAND_PARAMS);
    assert_shape(&params, &payload);

    let hex = split_hex_values(&payload).unwrap();
    assert_eq!(hex.len(), MAX_COMMAND_PARAMS);
}

#[test]
fn extreme_numbers_do_not_panic() {
    for input in [
        &b"t 99999999999 -99999999999 32768 -32768"[..],
        b"D ACK LIMIT -32768",
        b"M 1 ffffffffffff",
        b"- -32768",
        b"F -1 -1 -1",
        b"a -32768 -32768 -32768",
        b"w -32768 -32768 -32768",
    ] {
        check_tokenizers(input);
        let mut d = Dispatcher::default();
        let mut s = RecordingStation::new();
        check_dispatch(&mut d, &mut s, input);
    }
}
