//! Track power: `<0>`, `<1>` and their MAIN / PROG / JOIN forms.

use std::io::Write;

use super::{Ctx, Flow, HandlerResult};
use crate::error::CommandError;
use crate::hardware::{PowerMode, Track};
use crate::keyword;

pub(super) fn power(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    if p.len() > 1 {
        return Err(ctx.param_count());
    }
    let on = ctx.opcode == b'1';
    let mode = if on { PowerMode::On } else { PowerMode::Off };
    let digit = u8::from(on);
    let station = &mut *ctx.station;

    station.set_prog_track_sync_main(false);

    // A shared fault pin means the tracks can only be switched together.
    if p.is_empty() || (station.common_fault_pin() && p[0] != keyword::JOIN) {
        station.set_power(Track::Main, mode);
        station.set_power(Track::Prog, mode);
        if !on {
            station.set_prog_track_boost(false);
        }
        writeln!(ctx.reply, "<p{digit}>")?;
        return Ok(Flow::Done);
    }

    match p[0] {
        keyword::MAIN => {
            station.set_power(Track::Main, mode);
            writeln!(ctx.reply, "<p{digit} MAIN>")?;
        }
        keyword::PROG => {
            station.set_power(Track::Prog, mode);
            if !on {
                station.set_prog_track_boost(false);
            }
            writeln!(ctx.reply, "<p{digit} PROG>")?;
        }
        keyword::JOIN => {
            station.set_power(Track::Main, mode);
            station.set_power(Track::Prog, mode);
            if on {
                station.set_prog_track_sync_main(true);
                writeln!(ctx.reply, "<p1 JOIN>")?;
            } else {
                writeln!(ctx.reply, "<p0>")?;
            }
        }
        other => return Err(CommandError::UnknownKeyword(other).into()),
    }
    Ok(Flow::Done)
}
