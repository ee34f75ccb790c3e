//! `<D ...>` diagnostic and tuning commands.

use std::io::Write;

use tracing::info;

use super::{Ctx, Flow, HandlerResult};
use crate::diag::DiagChannel;
use crate::error::CommandError;
use crate::keyword;

fn toggle(ctx: &mut Ctx<'_, '_>, channel: DiagChannel, on: bool) {
    info!(?channel, on, "diagnostics");
    ctx.diag.set(channel, on);
    ctx.station.set_diagnostic(channel, on);
}

pub(super) fn diagnostic(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    if p.is_empty() {
        return Err(ctx.param_count());
    }
    let on = p[1] == 1 || p[1] == keyword::ON;

    match p[0] {
        keyword::CABS => ctx.station.display_cab_list(ctx.reply)?,
        keyword::RAM => {
            writeln!(ctx.reply, "Free memory={}", ctx.station.free_memory())?;
            return Err(CommandError::Unacknowledged.into());
        }
        keyword::ACK => {
            if p.len() >= 3 {
                match p[1] {
                    keyword::LIMIT => {
                        ctx.station.set_ack_limit(p[2]);
                        writeln!(ctx.reply, "Ack limit={}mA", p[2])?;
                    }
                    keyword::MIN => {
                        ctx.station.set_min_ack_pulse(p[2]);
                        writeln!(ctx.reply, "Ack min={}us", p[2])?;
                    }
                    keyword::MAX => {
                        ctx.station.set_max_ack_pulse(p[2]);
                        writeln!(ctx.reply, "Ack max={}us", p[2])?;
                    }
                    _ => {}
                }
            } else {
                writeln!(ctx.reply, "Ack diag {}", if on { "on" } else { "off" })?;
                toggle(ctx, DiagChannel::Ack, on);
            }
        }
        keyword::CMD => toggle(ctx, DiagChannel::Cmd, on),
        keyword::WIFI => toggle(ctx, DiagChannel::Wifi, on),
        keyword::ETHERNET => toggle(ctx, DiagChannel::Ethernet, on),
        keyword::WIT => toggle(ctx, DiagChannel::WiThrottle, on),
        keyword::LCN => toggle(ctx, DiagChannel::Lcn, on),
        keyword::PROGBOOST => ctx.station.set_prog_track_boost(true),
        keyword::RESET => {
            ctx.station.restart();
            return Err(CommandError::RestartFailed.into());
        }
        keyword::EEPROM => {
            if p.len() >= 2 {
                ctx.station.dump_eeprom(ctx.reply, p[1])?;
            }
        }
        keyword::SPEED28 => {
            ctx.station.set_global_speed_steps(28);
            write!(ctx.reply, "28 Speedsteps")?;
        }
        keyword::SPEED128 => {
            ctx.station.set_global_speed_steps(128);
            write!(ctx.reply, "128 Speedsteps")?;
        }
        keyword::SERVO => {
            let profile = if p.len() > 3 { p[3] } else { 0 };
            ctx.station.write_analogue(p[1], p[2], profile);
            return Err(CommandError::Unacknowledged.into());
        }
        other => return Err(CommandError::UnknownKeyword(other).into()),
    }
    Ok(Flow::Done)
}
