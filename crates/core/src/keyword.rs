//! Keyword hashing for the decimal tokenizer.
//!
//! Some clients send symbolic keywords (`MAIN`, `JOIN`, `SERVO`, ...) where
//! the protocol otherwise carries numbers. The tokenizer folds letters into
//! the same signed 16-bit running value as digits, so a keyword arrives at
//! the dispatcher as an ordinary parameter and is recognised by comparing
//! against the constants below.
//!
//! The fold is `value = ((value << 5) + value) ^ LETTER` for each letter and
//! `value = value * 10 + digit` for each digit, with 16-bit wrap-around.
//! Handlers depend on the exact values, so the formula must not change.

/// Fold one byte into a running keyword/number value.
///
/// Lowercase letters are upper-cased first. Bytes that are neither ASCII
/// digits nor letters leave the value unchanged; the tokenizer treats them
/// as separators before they get here.
pub const fn fold(value: i16, byte: u8) -> i16 {
    match byte {
        b'0'..=b'9' => value.wrapping_mul(10).wrapping_add((byte - b'0') as i16),
        b'a'..=b'z' | b'A'..=b'Z' => {
            let upper = byte.to_ascii_uppercase();
            value.wrapping_shl(5).wrapping_add(value) ^ upper as i16
        }
        _ => value,
    }
}

/// Hash a keyword the same way the tokenizer does when it reads it.
///
/// `keyword_hash("MAIN") == MAIN` and `keyword_hash("main") == MAIN`.
pub const fn keyword_hash(keyword: &str) -> i16 {
    let bytes = keyword.as_bytes();
    let mut value = 0i16;
    let mut i = 0;
    while i < bytes.len() {
        value = fold(value, bytes[i]);
        i += 1;
    }
    value
}

/// `PROG`: programming track.
pub const PROG: i16 = keyword_hash("PROG");
/// `MAIN`: main operating track.
pub const MAIN: i16 = keyword_hash("MAIN");
/// `JOIN`: drive the programming track from the main signal.
pub const JOIN: i16 = keyword_hash("JOIN");
/// `CABS`: dump the loco reminder table.
pub const CABS: i16 = keyword_hash("CABS");
/// `RAM`: report free memory.
pub const RAM: i16 = keyword_hash("RAM");
/// `CMD`: command parser diagnostics.
pub const CMD: i16 = keyword_hash("CMD");
/// `WIT`: WiThrottle diagnostics.
pub const WIT: i16 = keyword_hash("WIT");
/// `WIFI`: WiFi diagnostics.
pub const WIFI: i16 = keyword_hash("WIFI");
/// `ACK`: programming-track acknowledgement diagnostics and tuning.
pub const ACK: i16 = keyword_hash("ACK");
/// `ON`: diagnostic toggle value.
pub const ON: i16 = keyword_hash("ON");
/// `DCC`: DCC accessory turnout type.
pub const DCC: i16 = keyword_hash("DCC");
/// `SLOW`: reserved servo profile keyword.
pub const SLOW: i16 = keyword_hash("SLOW");
/// `PROGBOOST`: lift the programming-track current limit.
pub const PROGBOOST: i16 = keyword_hash("PROGBOOST");
/// `EEPROM`: dump stored EEPROM entries.
pub const EEPROM: i16 = keyword_hash("EEPROM");
/// `LIMIT`: acknowledgement current threshold.
pub const LIMIT: i16 = keyword_hash("LIMIT");
/// `ETHERNET`: Ethernet diagnostics.
pub const ETHERNET: i16 = keyword_hash("ETHERNET");
/// `MAX`: maximum acknowledgement pulse duration.
pub const MAX: i16 = keyword_hash("MAX");
/// `MIN`: minimum acknowledgement pulse duration.
pub const MIN: i16 = keyword_hash("MIN");
/// `LCN`: LCN bus diagnostics.
pub const LCN: i16 = keyword_hash("LCN");
/// `RESET`: watchdog restart.
pub const RESET: i16 = keyword_hash("RESET");
/// `SPEED28`: 28 speed-step mode.
pub const SPEED28: i16 = keyword_hash("SPEED28");
/// `SPEED128`: 128 speed-step mode.
pub const SPEED128: i16 = keyword_hash("SPEED128");
/// `SERVO`: servo turnout type / raw servo write.
pub const SERVO: i16 = keyword_hash("SERVO");
/// `VPIN`: virtual-pin turnout type.
pub const VPIN: i16 = keyword_hash("VPIN");
/// `C`: close a turnout.
pub const C: i16 = keyword_hash("C");
/// `T`: throw a turnout.
pub const T: i16 = keyword_hash("T");

/// Name of a recognised keyword constant, for diagnostics output.
pub fn keyword_name(value: i16) -> Option<&'static str> {
    KNOWN.iter().find(|(_, v)| *v == value).map(|(name, _)| *name)
}

const KNOWN: &[(&str, i16)] = &[
    ("PROG", PROG),
    ("MAIN", MAIN),
    ("JOIN", JOIN),
    ("CABS", CABS),
    ("RAM", RAM),
    ("CMD", CMD),
    ("WIT", WIT),
    ("WIFI", WIFI),
    ("ACK", ACK),
    ("ON", ON),
    ("DCC", DCC),
    ("SLOW", SLOW),
    ("PROGBOOST", PROGBOOST),
    ("EEPROM", EEPROM),
    ("LIMIT", LIMIT),
    ("ETHERNET", ETHERNET),
    ("MAX", MAX),
    ("MIN", MIN),
    ("LCN", LCN),
    ("RESET", RESET),
    ("SPEED28", SPEED28),
    ("SPEED128", SPEED128),
    ("SERVO", SERVO),
    ("VPIN", VPIN),
    ("C", C),
    ("T", T),
];
