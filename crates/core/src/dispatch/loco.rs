//! Loco and accessory commands on the main track.

use std::io::Write;

use tracing::debug;

use super::{Ctx, Flow, HandlerResult};
use crate::diag::DiagChannel;
use crate::error::CommandError;

/// Map a protocol speed (-1 emergency stop, 0..=126) to the internal
/// speed byte (1 emergency stop, 0 stop, 2..=127 running).
pub fn dcc_speed(protocol_speed: i16) -> Option<u8> {
    match protocol_speed {
        -1 => Some(1),
        0 => Some(0),
        1..=126 => u8::try_from(protocol_speed + 1).ok(),
        _ => None,
    }
}

/// Decode a function-group packet into `(first, last, bits)`: bit 0 of
/// `bits` drives function `first`, bit 1 `first + 1`, and so on.
///
/// `instruction` is the second parameter of `<f cab byte1 [byte2]>`;
/// `data` is the third parameter if present.
pub fn function_group(instruction: i16, data: Option<i16>) -> Option<(u8, u8, u8)> {
    match data {
        None => match instruction & 0xE0 {
            0x80 => {
                // F0 is bit 4 on the wire; rotate it down to bit 0.
                let normalized = ((instruction << 1) & 0x1E) | ((instruction >> 4) & 0x01);
                Some((0, 4, normalized as u8))
            }
            0xA0 if instruction & 0x10 != 0 => Some((5, 8, instruction as u8)),
            0xA0 => Some((9, 12, instruction as u8)),
            _ => None,
        },
        Some(data) => match instruction {
            222 => Some((13, 20, data as u8)),
            223 => Some((21, 28, data as u8)),
            _ => None,
        },
    }
}

/// Convert a linear accessory address (1..=2048) into `(address, subaddress)`.
pub fn accessory_address(linear: i16) -> (i16, i16) {
    let zero_based = linear.wrapping_sub(1);
    (zero_based / 4 + 1, zero_based % 4)
}

pub(super) fn throttle(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    let (cab, speed, direction) = match p.len() {
        4 => (p[1], p[2], p[3]),
        3 => (p[0], p[1], p[2]),
        _ => return Err(ctx.param_count()),
    };
    let internal = dcc_speed(speed).ok_or(CommandError::OutOfRange {
        what: "speed",
        value: speed,
    })?;
    if cab == 0 && internal > 1 {
        return Err(CommandError::OutOfRange {
            what: "broadcast speed",
            value: speed,
        }
        .into());
    }
    if !(0..=1).contains(&direction) {
        return Err(CommandError::OutOfRange {
            what: "direction",
            value: direction,
        }
        .into());
    }
    ctx.station.set_throttle(cab, internal, direction == 1);
    // Both forms echo the throttle state rather than a bare `<O>`. The legacy
    // form echoes its register number in place of the cab.
    writeln!(ctx.reply, "<T {} {} {}>", p[0], speed, direction)?;
    Ok(Flow::Done)
}

pub(super) fn function_bits(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    let data = match p.len() {
        2 => None,
        3 => Some(p[2]),
        _ => return Ok(Flow::Done),
    };
    if let Some((first, last, bits)) = function_group(p[1], data) {
        for (i, function) in (first..=last).enumerate() {
            ctx.station
                .set_function(p[0], i16::from(function), bits & (1 << i) != 0);
        }
    }
    Ok(Flow::Done)
}

pub(super) fn function(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    if ctx.diag_on(DiagChannel::Cmd) {
        debug!(cab = p[0], function = p[1], state = p[2], "set function");
    }
    ctx.station.set_function(p[0], p[1], p[2] == 1);
    Ok(Flow::Done)
}

pub(super) fn accessory(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    let (address, subaddress, activate) = match p.len() {
        2 => {
            let (address, subaddress) = accessory_address(p[0]);
            (address, subaddress, p[1])
        }
        3 => (p[0], p[1], p[2]),
        _ => return Err(ctx.param_count()),
    };
    if address & 0x01FF != address {
        return Err(CommandError::OutOfRange {
            what: "accessory address",
            value: address,
        }
        .into());
    }
    if subaddress & 0x03 != subaddress {
        return Err(CommandError::OutOfRange {
            what: "accessory subaddress",
            value: subaddress,
        }
        .into());
    }
    if activate & 0x01 != activate {
        return Err(CommandError::OutOfRange {
            what: "accessory activate",
            value: activate,
        }
        .into());
    }
    ctx.station
        .set_accessory(address as u16, subaddress as u8, activate == 1);
    Ok(Flow::Done)
}

pub(super) fn forget(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    if p.len() > 1 {
        return Err(ctx.param_count());
    }
    if p[0] < 0 {
        return Err(CommandError::OutOfRange {
            what: "cab",
            value: p[0],
        }
        .into());
    }
    if p[0] == 0 {
        ctx.station.forget_all_locos();
    } else {
        ctx.station.forget_loco(p[0]);
    }
    Ok(Flow::Done)
}

pub(super) fn emergency_stop(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    ctx.station.set_throttle(0, 1, true);
    Ok(Flow::Done)
}

pub(super) fn write_cv_main(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    ctx.station.write_cv_byte_main(p[0], p[1], p[2]);
    Ok(Flow::Done)
}

pub(super) fn write_cv_bit_main(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    ctx.station.write_cv_bit_main(p[0], p[1], p[2], p[3]);
    Ok(Flow::Done)
}
