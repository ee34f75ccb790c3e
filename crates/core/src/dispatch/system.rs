//! Station-wide commands: status, current meter, EEPROM, loco slots and the
//! transport escape.

use std::io::Write;

use tracing::info;

use super::registry::{write_sensor_state, write_turnout_state};
use super::{Ctx, Flow, HandlerResult};
use crate::error::CommandError;
use crate::hardware::{PowerMode, Track};

pub(super) fn current(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let reading = ctx.station.current(Track::Main);
    writeln!(
        ctx.reply,
        "<c CurrentMAIN {} C Milli 0 {} 1 {}>",
        reading.current_ma, reading.max_ma, reading.trip_ma
    )?;
    writeln!(ctx.reply, "<a {}>", reading.raw)?;
    Ok(Flow::Done)
}

pub(super) fn status(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let on = ctx.station.power(Track::Main) == PowerMode::On;
    writeln!(ctx.reply, "<p{}>", u8::from(on))?;
    let config = ctx.config;
    writeln!(
        ctx.reply,
        "<iDCC-EX V-{} / {} / {} G-{}>",
        config.version,
        config.board,
        ctx.station.motor_shield_name(),
        config.build_sha
    )?;
    for t in ctx.station.turnouts() {
        write_turnout_state(ctx.reply, t.id, t.closed)?;
    }
    for o in ctx.station.outputs() {
        writeln!(ctx.reply, "<Y {} {}>", o.id, u8::from(o.active))?;
    }
    for s in ctx.station.sensors() {
        write_sensor_state(ctx.reply, s.id, s.active)?;
    }
    Ok(Flow::Done)
}

pub(super) fn store(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let counts = ctx.station.store_eeprom();
    writeln!(
        ctx.reply,
        "<e {} {} {}>",
        counts.turnouts, counts.sensors, counts.outputs
    )?;
    Ok(Flow::Done)
}

pub(super) fn clear(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    ctx.station.clear_eeprom();
    writeln!(ctx.reply, "<O>")?;
    Ok(Flow::Done)
}

/// Only reachable when a filter rewrites the opcode; the dispatcher strips
/// leading spaces.
pub(super) fn blank(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    writeln!(ctx.reply)?;
    Ok(Flow::Done)
}

pub(super) fn loco_slots(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    writeln!(ctx.reply, "<# {}>", ctx.config.max_locos)?;
    Ok(Flow::Done)
}

pub(super) fn transport(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let Some(hook) = ctx.transport.as_mut() else {
        return Err(CommandError::NoTransportHook.into());
    };
    info!("transport escape: powering tracks off");
    ctx.station.set_power(Track::Main, PowerMode::Off);
    ctx.station.set_power(Track::Prog, PowerMode::Off);
    hook.at_command(ctx.raw);
    Ok(Flow::Done)
}
