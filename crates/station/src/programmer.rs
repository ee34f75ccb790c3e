//! Simulated programming track.
//!
//! Operations run against an in-memory decoder. Each one finishes on the
//! next [`Programmer::tick`], which hands back the completion kind and result
//! code for the host to pass to `Dispatcher::complete`.

use std::collections::BTreeMap;

use dccex_core::CompletionKind;
use tracing::debug;

use crate::layout::DecoderDef;

/// Configuration CV holding the long-address flag (bit 5).
const CV_CONFIG: u16 = 29;
/// Short address CV.
const CV_SHORT_ADDRESS: u16 = 1;
/// Long address high byte CV.
const CV_LONG_HIGH: u16 = 17;
/// Long address low byte CV.
const CV_LONG_LOW: u16 = 18;
/// Long-address flag in CV29.
const LONG_ADDRESS_BIT: u8 = 1 << 5;

/// Result code for a failed operation (no acknowledgement).
const NO_ACK: i16 = -1;

/// A mobile decoder's CV memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoder {
    cvs: BTreeMap<u16, u8>,
}

impl Decoder {
    /// Decoder with the given CV contents.
    pub fn new(cvs: BTreeMap<u16, u8>) -> Self {
        Self { cvs }
    }

    /// Read a CV, if the decoder implements it.
    pub fn cv(&self, cv: u16) -> Option<u8> {
        self.cvs.get(&cv).copied()
    }

    fn set_cv(&mut self, cv: u16, value: u8) {
        self.cvs.insert(cv, value);
    }

    /// The active loco address: long if CV29 bit 5 is set, otherwise CV1.
    pub fn address(&self) -> Option<u16> {
        let config = self.cv(CV_CONFIG).unwrap_or(0);
        if config & LONG_ADDRESS_BIT != 0 {
            let high = u16::from(self.cv(CV_LONG_HIGH)? & 0x3F);
            let low = u16::from(self.cv(CV_LONG_LOW)?);
            Some((high << 8) | low)
        } else {
            self.cv(CV_SHORT_ADDRESS).map(u16::from)
        }
    }
}

impl From<&DecoderDef> for Decoder {
    fn from(def: &DecoderDef) -> Self {
        Self::new(def.cvs.clone())
    }
}

fn cv_number(cv: i16) -> Option<u16> {
    u16::try_from(cv).ok().filter(|cv| (1..=1024).contains(cv))
}

fn cv_value(value: i16) -> Option<u8> {
    u8::try_from(value).ok()
}

fn bit_index(bit: i16) -> Option<u8> {
    u8::try_from(bit).ok().filter(|b| *b < 8)
}

/// The programming track and whatever decoder sits on it.
#[derive(Debug, Default)]
pub struct Programmer {
    decoder: Option<Decoder>,
    pending: Option<(CompletionKind, i16)>,
}

impl Programmer {
    /// Programming track with `decoder` on it (or empty).
    pub fn new(decoder: Option<Decoder>) -> Self {
        Self {
            decoder,
            pending: None,
        }
    }

    /// The decoder on the track.
    pub fn decoder(&self) -> Option<&Decoder> {
        self.decoder.as_ref()
    }

    /// Put a decoder on the track, or take it off.
    pub fn set_decoder(&mut self, decoder: Option<Decoder>) {
        self.decoder = decoder;
    }

    /// Whether an operation is waiting to finish.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Finish the pending operation, if any.
    pub fn tick(&mut self) -> Option<(CompletionKind, i16)> {
        self.pending.take()
    }

    fn finish(&mut self, done: CompletionKind, result: i16) {
        debug!(?done, result, "programming operation queued");
        self.pending = Some((done, result));
    }

    fn with_decoder(&mut self, op: impl FnOnce(&mut Decoder) -> Option<i16>) -> i16 {
        self.decoder.as_mut().and_then(op).unwrap_or(NO_ACK)
    }

    /// Write a CV byte; result 1 on success.
    pub fn write_cv_byte(&mut self, cv: i16, value: i16, done: CompletionKind) {
        let result = self.with_decoder(|d| {
            d.set_cv(cv_number(cv)?, cv_value(value)?);
            Some(1)
        });
        self.finish(done, result);
    }

    /// Write one CV bit; result 1 on success.
    pub fn write_cv_bit(&mut self, cv: i16, bit: i16, value: i16, done: CompletionKind) {
        let result = self.with_decoder(|d| {
            let cv = cv_number(cv)?;
            let mask = 1u8 << bit_index(bit)?;
            let current = d.cv(cv)?;
            let updated = match value {
                0 => current & !mask,
                1 => current | mask,
                _ => return None,
            };
            d.set_cv(cv, updated);
            Some(1)
        });
        self.finish(done, result);
    }

    /// Verify a CV byte; the result is the value actually held.
    pub fn verify_cv_byte(&mut self, cv: i16, _value: i16, done: CompletionKind) {
        let result = self.with_decoder(|d| d.cv(cv_number(cv)?).map(i16::from));
        self.finish(done, result);
    }

    /// Verify a CV bit; the result is the bit actually held.
    pub fn verify_cv_bit(&mut self, cv: i16, bit: i16, _value: i16, done: CompletionKind) {
        let result = self.with_decoder(|d| {
            let bit = bit_index(bit)?;
            let current = d.cv(cv_number(cv)?)?;
            Some(i16::from((current >> bit) & 1))
        });
        self.finish(done, result);
    }

    /// Read a CV byte.
    pub fn read_cv(&mut self, cv: i16, done: CompletionKind) {
        let result = self.with_decoder(|d| d.cv(cv_number(cv)?).map(i16::from));
        self.finish(done, result);
    }

    /// Read the active loco address.
    pub fn get_loco_id(&mut self, done: CompletionKind) {
        let result = self.with_decoder(|d| d.address().and_then(|a| i16::try_from(a).ok()));
        self.finish(done, result);
    }

    /// Write a short (1..=127) or long (128..=10239) address; result 1 on
    /// success.
    pub fn set_loco_id(&mut self, id: i16, done: CompletionKind) {
        let result = self.with_decoder(|d| {
            let config = d.cv(CV_CONFIG).unwrap_or(0);
            match id {
                1..=127 => {
                    d.set_cv(CV_SHORT_ADDRESS, id as u8);
                    d.set_cv(CV_CONFIG, config & !LONG_ADDRESS_BIT);
                }
                128..=10239 => {
                    d.set_cv(CV_LONG_HIGH, 0xC0 | (id >> 8) as u8);
                    d.set_cv(CV_LONG_LOW, (id & 0xFF) as u8);
                    d.set_cv(CV_CONFIG, config | LONG_ADDRESS_BIT);
                }
                _ => return None,
            }
            Some(1)
        });
        self.finish(done, result);
    }
}
