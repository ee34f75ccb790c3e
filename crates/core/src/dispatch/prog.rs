//! Programming track and raw packets: `<W>`, `<V>`, `<B>`, `<R>`, `<M>`, `<P>`.

use tracing::debug;

use super::{Ctx, Flow, HandlerResult};
use crate::diag::DiagChannel;
use crate::error::{CommandError, HandlerError};
use crate::hardware::Track;
use crate::stash::CompletionKind;
use crate::tokenizer::split_hex_values;

/// Claim the stash for this command's client.
fn arm(ctx: &mut Ctx<'_, '_>) -> Result<(), HandlerError> {
    let route = ctx.reply.route();
    ctx.stash
        .arm(route, &ctx.params)
        .map_err(|_| CommandError::StashBusy)?;
    Ok(())
}

pub(super) fn write_cv(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    arm(ctx)?;
    let p = ctx.params;
    if p.len() == 1 {
        let kind = CompletionKind::WriteLocoId;
        ctx.station.set_loco_id(p[0], kind);
        Ok(Flow::Deferred(kind))
    } else {
        let kind = CompletionKind::WriteByte;
        ctx.station.write_cv_byte(p[0], p[1], kind);
        Ok(Flow::Deferred(kind))
    }
}

pub(super) fn verify_cv(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    let kind = match p.len() {
        2 => CompletionKind::VerifyByte,
        3 => CompletionKind::VerifyBit,
        _ => return Err(ctx.param_count()),
    };
    arm(ctx)?;
    match kind {
        CompletionKind::VerifyByte => ctx.station.verify_cv_byte(p[0], p[1], kind),
        _ => ctx.station.verify_cv_bit(p[0], p[1], p[2], kind),
    }
    Ok(Flow::Deferred(kind))
}

pub(super) fn write_cv_bit(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    arm(ctx)?;
    let p = ctx.params;
    let kind = CompletionKind::WriteBit;
    ctx.station.write_cv_bit(p[0], p[1], p[2], kind);
    Ok(Flow::Deferred(kind))
}

pub(super) fn read_cv(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let p = ctx.params;
    let kind = match p.len() {
        3 => CompletionKind::ReadByte,
        0 => CompletionKind::ReadLocoId,
        _ => return Err(ctx.param_count()),
    };
    arm(ctx)?;
    if kind == CompletionKind::ReadByte {
        ctx.station.read_cv(p[0], kind);
    } else {
        ctx.station.get_loco_id(kind);
    }
    Ok(Flow::Deferred(kind))
}

pub(super) fn raw_packet(ctx: &mut Ctx<'_, '_>) -> HandlerResult {
    let hex = split_hex_values(ctx.raw)?;
    // First operand is an unused register number.
    let packet: Vec<u8> = hex.shift().as_slice().iter().map(|&b| b as u8).collect();
    if packet.is_empty() {
        return Err(CommandError::EmptyPacket.into());
    }
    let track = if ctx.opcode == b'M' {
        Track::Main
    } else {
        Track::Prog
    };
    if ctx.diag_on(DiagChannel::Cmd) {
        debug!(?track, packet = ?packet, "raw packet");
    }
    ctx.station
        .schedule_packet(track, &packet, ctx.config.packet_repeats);
    Ok(Flow::Done)
}
