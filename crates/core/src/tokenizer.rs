//! Parameter tokenizers.
//!
//! Both tokenizers take the whole command payload (opcode first), skip the
//! opcode byte, and produce a [`Params`] list of signed 16-bit values.
//! NUL, `>` and the end of the slice all terminate the scan.

use std::fmt;

use crate::error::HexError;
use crate::keyword;

/// Maximum number of parameters carried by one command.
pub const MAX_COMMAND_PARAMS: usize = 10;

/// Fixed-size parameter list produced for one command.
///
/// Slots past [`Params::len`] are always zero, so handlers may index them
/// freely (e.g. the optional callback ids of `<W CV VALUE>`).
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Params {
    values: [i16; MAX_COMMAND_PARAMS],
    count: usize,
}

impl Params {
    /// An empty parameter list.
    pub const fn new() -> Self {
        Self {
            values: [0; MAX_COMMAND_PARAMS],
            count: 0,
        }
    }

    /// Build a list from explicit values, truncated to [`MAX_COMMAND_PARAMS`].
    pub fn from_slice(values: &[i16]) -> Self {
        let mut params = Self::new();
        for &v in values.iter().take(MAX_COMMAND_PARAMS) {
            params.push(v);
        }
        params
    }

    /// Number of parameters actually parsed.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether no parameters were parsed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The parsed parameters.
    pub fn as_slice(&self) -> &[i16] {
        &self.values[..self.count]
    }

    /// All slots, including the zero-filled unused ones.
    pub fn slots(&self) -> &[i16; MAX_COMMAND_PARAMS] {
        &self.values
    }

    /// Parameter at `index`, or zero past the parsed count.
    pub fn get(&self, index: usize) -> i16 {
        self.values.get(index).copied().unwrap_or(0)
    }

    /// Overwrite a slot. Writing past the current count extends it.
    pub fn set(&mut self, index: usize, value: i16) {
        if index < MAX_COMMAND_PARAMS {
            self.values[index] = value;
            self.count = self.count.max(index + 1);
        }
    }

    /// Drop the first parameter, shifting the rest down.
    pub fn shift(&self) -> Self {
        let mut shifted = Self::new();
        for &v in self.as_slice().iter().skip(1) {
            shifted.push(v);
        }
        shifted
    }

    fn push(&mut self, value: i16) -> bool {
        if self.count == MAX_COMMAND_PARAMS {
            return false;
        }
        self.values[self.count] = value;
        self.count += 1;
        true
    }

    fn is_full(&self) -> bool {
        self.count == MAX_COMMAND_PARAMS
    }
}

impl std::ops::Index<usize> for Params {
    type Output = i16;

    fn index(&self, index: usize) -> &i16 {
        &self.values[index]
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

fn is_terminator(byte: Option<u8>) -> bool {
    matches!(byte, None | Some(0) | Some(b'>'))
}

/// Scanner state shared by both tokenizers.
#[derive(Clone, Copy)]
enum Scan {
    /// Skipping spaces before a parameter.
    Gap,
    /// About to read the optional sign.
    Sign,
    /// Accumulating digits / letters.
    Value,
}

/// Split a command into decimal parameters, hashing keywords.
///
/// Letters fold into the running value via [`keyword::fold`], so
/// `<1 MAIN>` yields `[keyword::MAIN]`. Arithmetic wraps at 16 bits.
/// Any byte other than a digit, letter, space or terminator ends the current
/// parameter without being consumed; it then starts (and immediately ends)
/// zero-valued parameters until the list is full.
pub fn split_values(cmd: &[u8]) -> Params {
    let mut params = Params::new();
    let mut state = Scan::Gap;
    let mut value = 0i16;
    let mut negative = false;
    let mut pos = 1usize;

    while !params.is_full() {
        let hot = cmd.get(pos).copied();
        match state {
            Scan::Gap => {
                if hot == Some(b' ') {
                    pos += 1;
                    continue;
                }
                if is_terminator(hot) {
                    return params;
                }
                state = Scan::Sign;
            }
            Scan::Sign => {
                negative = false;
                value = 0;
                state = Scan::Value;
                if hot == Some(b'-') {
                    negative = true;
                    pos += 1;
                }
            }
            Scan::Value => match hot {
                Some(b) if b.is_ascii_alphanumeric() => {
                    value = keyword::fold(value, b);
                    pos += 1;
                }
                _ => {
                    params.push(if negative { value.wrapping_neg() } else { value });
                    state = Scan::Gap;
                }
            },
        }
    }
    params
}

/// Split a command into hexadecimal parameters.
///
/// Used by the raw packet commands, whose operands are always hex bytes.
/// A byte that is not a hex digit, space or terminator aborts the whole scan.
pub fn split_hex_values(cmd: &[u8]) -> Result<Params, HexError> {
    let mut params = Params::new();
    let mut state = Scan::Gap;
    let mut value = 0i16;
    let mut pos = 1usize;

    while !params.is_full() {
        let hot = cmd.get(pos).copied();
        match state {
            Scan::Gap => {
                if hot == Some(b' ') {
                    pos += 1;
                    continue;
                }
                if is_terminator(hot) {
                    return Ok(params);
                }
                state = Scan::Sign;
            }
            // Hex operands carry no sign.
            Scan::Sign => {
                value = 0;
                state = Scan::Value;
            }
            Scan::Value => match hot {
                Some(b) if b.is_ascii_hexdigit() => {
                    let digit = (b as char).to_digit(16).unwrap_or(0) as i16;
                    value = value.wrapping_mul(16).wrapping_add(digit);
                    pos += 1;
                }
                Some(b' ') | Some(0) | Some(b'>') | None => {
                    params.push(value);
                    state = Scan::Gap;
                }
                Some(b) => {
                    return Err(HexError::InvalidDigit {
                        digit: b as char,
                        offset: pos,
                    });
                }
            },
        }
    }
    Ok(params)
}
