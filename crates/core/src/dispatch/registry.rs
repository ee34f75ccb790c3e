//! Turnout, output and sensor definitions: `<T>`, `<Z>`, `<S>`, `<Q>`.

use std::io::{self, Write};

use super::{Ctx, Flow, HandlerResult};
use crate::error::CommandError;
use crate::hardware::{SensorInfo, TurnoutInfo, TurnoutKind};
use crate::keyword;

/// Full definition line of a turnout, as listed by `<T>`.
pub(crate) fn write_turnout(out: &mut dyn Write, t: &TurnoutInfo) -> io::Result<()> {
    writeln!(out, "<H {} {} {}>", t.id, t.kind, u8::from(!t.closed))
}

/// Short state line of a turnout: `<H id 0|1>`, 1 meaning thrown.
pub(crate) fn write_turnout_state(out: &mut dyn Write, id: i16, closed: bool) -> io::Result<()> {
    writeln!(out, "<H {} {}>", id, u8::from(!closed))
}

/// `<Q id>` for an active sensor, `<q id>` for an inactive one.
pub(crate) fn write_sensor_state(out: &mut dyn Write, id: i16, active: bool) -> io::Result<()> {
    let tag = if active { 'Q' } else { 'q' };
    writeln!(out, "<{tag} {id}>")
}

fn turnout_kind(ctx: &Ctx<'_, '_>) -> Result<TurnoutKind, CommandError> {
    let p = ctx.params;
    let out_of_range = |what, value| CommandError::OutOfRange { what, value };
    match p.len() {
        6 if p[1] == keyword::SERVO => Ok(TurnoutKind::Servo {
            vpin: p[2] as u16,
            thrown_position: p[3] as u16,
            closed_position: p[4] as u16,
            profile: p[5] as u8,
        }),
        3 if p[1] == keyword::VPIN => Ok(TurnoutKind::Vpin { vpin: p[2] as u16 }),
        n if n >= 3 && p[1] == keyword::DCC => match n {
            4 if (1..=512).contains(&p[2]) && (0..4).contains(&p[3]) => Ok(TurnoutKind::Dcc {
                address: p[2] as u16,
                subaddress: p[3] as u8,
            }),
            3 if (1..=2048).contains(&p[2]) => {
                let (address, subaddress) = super::loco::accessory_address(p[2]);
                Ok(TurnoutKind::Dcc {
                    address: address as u16,
                    subaddress: subaddress as u8,
                })
            }
            _ => Err(out_of_range("DCC turnout address", p[2])),
        },
        3 => {
            if !(1..=512).contains(&p[1]) {
                return Err(out_of_range("turnout address", p[1]));
            }
            if !(0..4).contains(&p[2]) {
                return Err(out_of_range("turnout subaddress", p[2]));
            }
            Ok(TurnoutKind::Dcc {
                address: p[1] as u16,
                subaddress: p[2] as u8,
            })
        }
        4 => Ok(TurnoutKind::Servo {
            vpin: p[1] as u16,
            thrown_position: p[2] as u16,
            closed_position: p[3] as u16,
            profile: 1,
        }),
        n => Err(CommandError::ParamCount {
            opcode: 'T',
            count: n,
        }),
    }
}

pub(super) fn turnout(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    match p.len() {
        0 => {
            let turnouts = ctx.station.turnouts();
            if turnouts.is_empty() {
                return Err(CommandError::NothingToList.into());
            }
            for t in &turnouts {
                write_turnout(ctx.reply, t)?;
            }
        }
        1 => {
            if !ctx.station.remove_turnout(p[0]) {
                return Err(CommandError::NotFound(p[0]).into());
            }
            writeln!(ctx.reply, "<O>")?;
        }
        2 => {
            let classic = ctx.config.classic_turnout_commands;
            let closed = match p[1] {
                0 => classic,
                1 => !classic,
                keyword::C => true,
                keyword::T => false,
                other => return Err(CommandError::UnknownKeyword(other).into()),
            };
            if !ctx.station.set_turnout_closed(p[0], closed) {
                return Err(CommandError::NotFound(p[0]).into());
            }
            // The console already sees the registry's own state broadcast.
            if !ctx.reply.is_console() {
                write_turnout_state(ctx.reply, p[0], closed)?;
            }
        }
        _ => {
            let kind = turnout_kind(ctx)?;
            if !ctx.station.create_turnout(p[0], kind) {
                return Err(CommandError::RegistryRefused(p[0]).into());
            }
            writeln!(ctx.reply, "<O>")?;
        }
    }
    Ok(Flow::Done)
}

pub(super) fn output(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    match p.len() {
        2 => {
            if !ctx.station.activate_output(p[0], p[1]) {
                return Err(CommandError::NotFound(p[0]).into());
            }
            writeln!(ctx.reply, "<Y {} {}>", p[0], p[1])?;
        }
        3 => {
            if p[0] < 0 {
                return Err(CommandError::OutOfRange {
                    what: "output id",
                    value: p[0],
                }
                .into());
            }
            if !(0..=7).contains(&p[2]) {
                return Err(CommandError::OutOfRange {
                    what: "output flags",
                    value: p[2],
                }
                .into());
            }
            if !ctx.station.create_output(p[0], p[1], p[2] as u8) {
                return Err(CommandError::RegistryRefused(p[0]).into());
            }
            writeln!(ctx.reply, "<O>")?;
        }
        1 => {
            if !ctx.station.remove_output(p[0]) {
                return Err(CommandError::NotFound(p[0]).into());
            }
            writeln!(ctx.reply, "<O>")?;
        }
        0 => {
            let outputs = ctx.station.outputs();
            if outputs.is_empty() {
                return Err(CommandError::NothingToList.into());
            }
            for o in &outputs {
                writeln!(
                    ctx.reply,
                    "<Y {} {} {} {}>",
                    o.id,
                    o.pin,
                    o.flags,
                    u8::from(o.active)
                )?;
            }
        }
        _ => return Err(ctx.param_count()),
    }
    Ok(Flow::Done)
}

pub(super) fn sensor(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    match p.len() {
        3 => {
            if !ctx.station.create_sensor(p[0], p[1], p[2]) {
                return Err(CommandError::RegistryRefused(p[0]).into());
            }
            writeln!(ctx.reply, "<O>")?;
        }
        1 => {
            if !ctx.station.remove_sensor(p[0]) {
                return Err(CommandError::NotFound(p[0]).into());
            }
            writeln!(ctx.reply, "<O>")?;
        }
        0 => {
            let sensors = ctx.station.sensors();
            if sensors.is_empty() {
                return Err(CommandError::NothingToList.into());
            }
            for SensorInfo { id, pin, pullup, .. } in &sensors {
                writeln!(ctx.reply, "<Q {} {} {}>", id, pin, u8::from(*pullup))?;
            }
        }
        _ => return Err(ctx.param_count()),
    }
    Ok(Flow::Done)
}

pub(super) fn sensor_states(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let sensors = ctx.station.sensors();
    if sensors.is_empty() {
        return Err(CommandError::NothingToList.into());
    }
    for s in &sensors {
        write_sensor_state(ctx.reply, s.id, s.active)?;
    }
    Ok(Flow::Done)
}
