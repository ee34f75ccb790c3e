//! In-memory command station.

use std::collections::BTreeMap;
use std::io::{self, Write};

use dccex_core::diag::{DiagChannel, DiagFlags};
use dccex_core::{
    CompletionKind, CurrentReading, EepromCounts, EepromStore, LocoControl, OutputInfo,
    OutputRegistry, PowerMode, ProgrammingTrack, SensorChange, SensorInfo, SensorRegistry,
    SystemControl, Track, TrackControl, TurnoutInfo, TurnoutKind, TurnoutRegistry,
};
use tracing::{debug, info, warn};

use crate::layout::Layout;
use crate::programmer::{Decoder, Programmer};

/// Highest function number tracked per loco.
const MAX_FUNCTION: i16 = 28;
/// Full-scale current of the simulated motor driver.
const MAX_CURRENT_MA: i32 = 2000;
/// Overload trip threshold of the simulated motor driver.
const TRIP_CURRENT_MA: i32 = 1500;
/// Idle draw of a powered track.
const IDLE_CURRENT_MA: i32 = 20;
/// Draw of one moving loco.
const LOCO_CURRENT_MA: i32 = 150;

/// Speed reminder entry for one loco.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocoState {
    /// Internal speed byte: 0 stop, 1 emergency stop, 2..=127 running.
    pub speed: u8,
    /// Travelling forward.
    pub forward: bool,
    /// Function states, bit n for Fn.
    pub functions: u32,
}

impl LocoState {
    /// Whether function `f` is on.
    pub fn function(&self, f: u8) -> bool {
        f <= 28 && self.functions & (1 << f) != 0
    }
}

/// A raw packet queued for a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPacket {
    /// Destination track.
    pub track: Track,
    /// Packet bytes, checksum excluded.
    pub bytes: Vec<u8>,
    /// Transmission count.
    pub repeats: u8,
}

/// An accessory decoder command sent on the main track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessoryCommand {
    /// Accessory address.
    pub address: u16,
    /// Sub-address.
    pub subaddress: u8,
    /// Activate (thrown) or deactivate.
    pub activate: bool,
}

#[derive(Debug, Clone)]
struct Sensor {
    info: SensorInfo,
    reported: bool,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    turnouts: Vec<TurnoutInfo>,
    outputs: Vec<OutputInfo>,
    sensors: Vec<SensorInfo>,
}

/// A command station whose hardware is simulated in memory.
///
/// Registries refuse negative ids. Programming operations complete on the
/// next [`MemoryStation::tick`].
#[derive(Debug)]
pub struct MemoryStation {
    main_power: PowerMode,
    prog_power: PowerMode,
    sync_main: bool,
    prog_boost: bool,
    common_fault_pin: bool,
    motor_shield: String,
    free_memory: usize,
    speed_steps: u8,
    max_locos: usize,
    locos: BTreeMap<i16, LocoState>,
    turnouts: Vec<TurnoutInfo>,
    outputs: Vec<OutputInfo>,
    sensors: Vec<Sensor>,
    eeprom: Option<Snapshot>,
    packets: Vec<ScheduledPacket>,
    accessories: Vec<AccessoryCommand>,
    analogue: Vec<(i16, i16, i16)>,
    programmer: Programmer,
    diagnostics: DiagFlags,
    ack_limit_ma: i16,
    min_ack_us: i16,
    max_ack_us: i16,
    restarts: usize,
}

impl Default for MemoryStation {
    fn default() -> Self {
        Self::from_layout(&Layout::default())
    }
}

impl MemoryStation {
    /// A station with an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// A station populated from `layout`.
    pub fn from_layout(layout: &Layout) -> Self {
        let turnouts = layout
            .turnouts
            .iter()
            .map(|t| TurnoutInfo {
                id: t.id,
                kind: t.kind,
                closed: t.closed,
            })
            .collect();
        let outputs = layout
            .outputs
            .iter()
            .map(|o| OutputInfo {
                id: o.id,
                pin: o.pin,
                flags: o.flags,
                active: false,
            })
            .collect();
        let sensors = layout
            .sensors
            .iter()
            .map(|s| Sensor {
                info: SensorInfo {
                    id: s.id,
                    pin: s.pin,
                    pullup: s.pullup,
                    active: false,
                },
                reported: false,
            })
            .collect();
        Self {
            main_power: PowerMode::Off,
            prog_power: PowerMode::Off,
            sync_main: false,
            prog_boost: false,
            common_fault_pin: layout.common_fault_pin,
            motor_shield: layout.motor_shield.clone(),
            free_memory: layout.free_memory,
            speed_steps: 128,
            max_locos: usize::from(layout.parser.max_locos),
            locos: BTreeMap::new(),
            turnouts,
            outputs,
            sensors,
            eeprom: None,
            packets: Vec::new(),
            accessories: Vec::new(),
            analogue: Vec::new(),
            programmer: Programmer::new(layout.decoder.as_ref().map(Decoder::from)),
            diagnostics: DiagFlags::default(),
            ack_limit_ma: 50,
            min_ack_us: 4000,
            max_ack_us: 8500,
            restarts: 0,
        }
    }

    /// Finish the pending programming operation, if any.
    pub fn tick(&mut self) -> Option<(CompletionKind, i16)> {
        self.programmer.tick()
    }

    /// The programming track.
    pub fn programmer(&self) -> &Programmer {
        &self.programmer
    }

    /// The programming track, for swapping decoders.
    pub fn programmer_mut(&mut self) -> &mut Programmer {
        &mut self.programmer
    }

    /// Speed reminder entry for `cab`.
    pub fn loco(&self, cab: i16) -> Option<LocoState> {
        self.locos.get(&cab).copied()
    }

    /// Drive a sensor input. Returns `false` for an unknown sensor.
    pub fn set_sensor_input(&mut self, id: i16, active: bool) -> bool {
        match self.sensors.iter_mut().find(|s| s.info.id == id) {
            Some(sensor) => {
                sensor.info.active = active;
                true
            }
            None => false,
        }
    }

    /// Raw packets scheduled so far.
    pub fn packets(&self) -> &[ScheduledPacket] {
        &self.packets
    }

    /// Accessory commands sent so far.
    pub fn accessories(&self) -> &[AccessoryCommand] {
        &self.accessories
    }

    /// Analogue writes `(vpin, value, profile)` so far.
    pub fn analogue_writes(&self) -> &[(i16, i16, i16)] {
        &self.analogue
    }

    /// Global speed-step mode.
    pub fn speed_steps(&self) -> u8 {
        self.speed_steps
    }

    /// Whether the programming track follows the main signal.
    pub fn prog_sync_main(&self) -> bool {
        self.sync_main
    }

    /// Whether the programming-track current limit is lifted.
    pub fn prog_boost(&self) -> bool {
        self.prog_boost
    }

    /// Diagnostic channels switched on.
    pub fn diagnostics(&self) -> DiagFlags {
        self.diagnostics
    }

    /// Acknowledgement settings `(limit mA, min us, max us)`.
    pub fn ack_settings(&self) -> (i16, i16, i16) {
        (self.ack_limit_ma, self.min_ack_us, self.max_ack_us)
    }

    /// Number of restart requests received.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// Whether a registry snapshot is stored.
    pub fn has_stored_layout(&self) -> bool {
        self.eeprom.is_some()
    }

    fn loco_entry(&mut self, cab: i16) -> Option<&mut LocoState> {
        if !self.locos.contains_key(&cab) && self.locos.len() >= self.max_locos {
            warn!(cab, max = self.max_locos, "speed reminder table full");
            return None;
        }
        Some(self.locos.entry(cab).or_default())
    }
}

impl LocoControl for MemoryStation {
    fn set_throttle(&mut self, cab: i16, speed: u8, forward: bool) {
        if cab == 0 {
            // Broadcast: only stop codes reach here.
            for loco in self.locos.values_mut() {
                loco.speed = speed;
            }
            info!(speed, "broadcast stop");
            return;
        }
        if let Some(loco) = self.loco_entry(cab) {
            loco.speed = speed;
            loco.forward = forward;
            debug!(cab, speed, forward, "throttle");
        }
    }

    fn set_function(&mut self, cab: i16, function: i16, on: bool) {
        if !(0..=MAX_FUNCTION).contains(&function) {
            warn!(cab, function, "function number out of range");
            return;
        }
        if let Some(loco) = self.loco_entry(cab) {
            let mask = 1u32 << function;
            if on {
                loco.functions |= mask;
            } else {
                loco.functions &= !mask;
            }
        }
    }

    fn forget_loco(&mut self, cab: i16) {
        self.locos.remove(&cab);
    }

    fn forget_all_locos(&mut self) {
        self.locos.clear();
    }

    fn write_cv_byte_main(&mut self, cab: i16, cv: i16, value: i16) {
        debug!(cab, cv, value, "POM byte write");
    }

    fn write_cv_bit_main(&mut self, cab: i16, cv: i16, bit: i16, value: i16) {
        debug!(cab, cv, bit, value, "POM bit write");
    }

    fn set_accessory(&mut self, address: u16, subaddress: u8, activate: bool) {
        self.accessories.push(AccessoryCommand {
            address,
            subaddress,
            activate,
        });
    }

    fn set_global_speed_steps(&mut self, steps: u8) {
        self.speed_steps = steps;
    }

    fn display_cab_list(&mut self, out: &mut dyn Write) -> io::Result<()> {
        write!(out, "<*")?;
        for (cab, loco) in &self.locos {
            write!(
                out,
                "\ncab={} speed={} dir={}",
                cab,
                loco.speed,
                if loco.forward { 'F' } else { 'R' }
            )?;
        }
        writeln!(out, "\nUsed={}, max={} *>", self.locos.len(), self.max_locos)
    }
}

impl TrackControl for MemoryStation {
    fn set_power(&mut self, track: Track, mode: PowerMode) {
        info!(?track, ?mode, "track power");
        match track {
            Track::Main => self.main_power = mode,
            Track::Prog => self.prog_power = mode,
        }
    }

    fn power(&self, track: Track) -> PowerMode {
        match track {
            Track::Main => self.main_power,
            Track::Prog => self.prog_power,
        }
    }

    fn set_prog_track_sync_main(&mut self, on: bool) {
        self.sync_main = on;
    }

    fn set_prog_track_boost(&mut self, on: bool) {
        self.prog_boost = on;
    }

    fn common_fault_pin(&self) -> bool {
        self.common_fault_pin
    }

    fn schedule_packet(&mut self, track: Track, packet: &[u8], repeats: u8) {
        self.packets.push(ScheduledPacket {
            track,
            bytes: packet.to_vec(),
            repeats,
        });
    }

    fn current(&self, track: Track) -> CurrentReading {
        let current_ma = if self.power(track) == PowerMode::On {
            let moving = match track {
                Track::Main => self.locos.values().filter(|l| l.speed > 1).count(),
                Track::Prog => 0,
            };
            let moving = i32::try_from(moving).unwrap_or(i32::MAX);
            (IDLE_CURRENT_MA + LOCO_CURRENT_MA.saturating_mul(moving)).min(MAX_CURRENT_MA)
        } else {
            0
        };
        CurrentReading {
            current_ma,
            max_ma: MAX_CURRENT_MA,
            trip_ma: TRIP_CURRENT_MA,
            raw: current_ma * 1024 / MAX_CURRENT_MA,
        }
    }

    fn set_ack_limit(&mut self, milliamps: i16) {
        self.ack_limit_ma = milliamps;
    }

    fn set_min_ack_pulse(&mut self, micros: i16) {
        self.min_ack_us = micros;
    }

    fn set_max_ack_pulse(&mut self, micros: i16) {
        self.max_ack_us = micros;
    }
}

impl ProgrammingTrack for MemoryStation {
    fn write_cv_byte(&mut self, cv: i16, value: i16, done: CompletionKind) {
        self.programmer.write_cv_byte(cv, value, done);
    }

    fn write_cv_bit(&mut self, cv: i16, bit: i16, value: i16, done: CompletionKind) {
        self.programmer.write_cv_bit(cv, bit, value, done);
    }

    fn verify_cv_byte(&mut self, cv: i16, value: i16, done: CompletionKind) {
        self.programmer.verify_cv_byte(cv, value, done);
    }

    fn verify_cv_bit(&mut self, cv: i16, bit: i16, value: i16, done: CompletionKind) {
        self.programmer.verify_cv_bit(cv, bit, value, done);
    }

    fn read_cv(&mut self, cv: i16, done: CompletionKind) {
        self.programmer.read_cv(cv, done);
    }

    fn get_loco_id(&mut self, done: CompletionKind) {
        self.programmer.get_loco_id(done);
    }

    fn set_loco_id(&mut self, id: i16, done: CompletionKind) {
        self.programmer.set_loco_id(id, done);
    }
}

impl TurnoutRegistry for MemoryStation {
    fn turnouts(&self) -> Vec<TurnoutInfo> {
        self.turnouts.clone()
    }

    fn create_turnout(&mut self, id: i16, kind: TurnoutKind) -> bool {
        if id < 0 {
            return false;
        }
        let info = TurnoutInfo {
            id,
            kind,
            closed: true,
        };
        match self.turnouts.iter_mut().find(|t| t.id == id) {
            Some(existing) => *existing = info,
            None => self.turnouts.push(info),
        }
        true
    }

    fn remove_turnout(&mut self, id: i16) -> bool {
        let before = self.turnouts.len();
        self.turnouts.retain(|t| t.id != id);
        self.turnouts.len() != before
    }

    fn set_turnout_closed(&mut self, id: i16, closed: bool) -> bool {
        let Some(turnout) = self.turnouts.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        turnout.closed = closed;
        let kind = turnout.kind;
        match kind {
            TurnoutKind::Dcc {
                address,
                subaddress,
            } => self.set_accessory(address, subaddress, !closed),
            TurnoutKind::Servo {
                vpin,
                thrown_position,
                closed_position,
                profile,
            } => {
                let position = if closed {
                    closed_position
                } else {
                    thrown_position
                };
                self.analogue.push((
                    vpin as i16,
                    position as i16,
                    i16::from(profile),
                ));
            }
            TurnoutKind::Vpin { vpin } => debug!(vpin, closed, "vpin turnout"),
        }
        true
    }
}

impl OutputRegistry for MemoryStation {
    fn outputs(&self) -> Vec<OutputInfo> {
        self.outputs.clone()
    }

    fn create_output(&mut self, id: i16, pin: i16, flags: u8) -> bool {
        if id < 0 || pin < 0 {
            return false;
        }
        let info = OutputInfo {
            id,
            pin,
            flags,
            active: false,
        };
        match self.outputs.iter_mut().find(|o| o.id == id) {
            Some(existing) => *existing = info,
            None => self.outputs.push(info),
        }
        true
    }

    fn remove_output(&mut self, id: i16) -> bool {
        let before = self.outputs.len();
        self.outputs.retain(|o| o.id != id);
        self.outputs.len() != before
    }

    fn activate_output(&mut self, id: i16, state: i16) -> bool {
        match self.outputs.iter_mut().find(|o| o.id == id) {
            Some(output) => {
                output.active = state != 0;
                true
            }
            None => false,
        }
    }
}

impl SensorRegistry for MemoryStation {
    fn sensors(&self) -> Vec<SensorInfo> {
        self.sensors.iter().map(|s| s.info).collect()
    }

    fn create_sensor(&mut self, id: i16, pin: i16, pullup: i16) -> bool {
        if id < 0 {
            return false;
        }
        let sensor = Sensor {
            info: SensorInfo {
                id,
                pin,
                pullup: pullup != 0,
                active: false,
            },
            reported: false,
        };
        match self.sensors.iter_mut().find(|s| s.info.id == id) {
            Some(existing) => *existing = sensor,
            None => self.sensors.push(sensor),
        }
        true
    }

    fn remove_sensor(&mut self, id: i16) -> bool {
        let before = self.sensors.len();
        self.sensors.retain(|s| s.info.id != id);
        self.sensors.len() != before
    }

    fn sensor_changes(&mut self) -> Vec<SensorChange> {
        self.sensors
            .iter_mut()
            .filter(|s| s.info.active != s.reported)
            .map(|s| {
                s.reported = s.info.active;
                SensorChange {
                    id: s.info.id,
                    active: s.info.active,
                }
            })
            .collect()
    }
}

impl EepromStore for MemoryStation {
    fn store_eeprom(&mut self) -> EepromCounts {
        let snapshot = Snapshot {
            turnouts: self.turnouts.clone(),
            outputs: self.outputs.clone(),
            sensors: self.sensors(),
        };
        let count = |n: usize| u16::try_from(n).unwrap_or(u16::MAX);
        let counts = EepromCounts {
            turnouts: count(snapshot.turnouts.len()),
            sensors: count(snapshot.sensors.len()),
            outputs: count(snapshot.outputs.len()),
        };
        info!(?counts, "layout stored");
        self.eeprom = Some(snapshot);
        counts
    }

    fn clear_eeprom(&mut self) {
        info!("stored layout cleared");
        self.eeprom = None;
    }

    fn dump_eeprom(&mut self, out: &mut dyn Write, entries: i16) -> io::Result<()> {
        let Some(snapshot) = &self.eeprom else {
            return writeln!(out, "EEPROM empty");
        };
        let limit = usize::try_from(entries).unwrap_or(0);
        let lines = snapshot
            .turnouts
            .iter()
            .map(|t| format!("T {} {} {}", t.id, t.kind, u8::from(!t.closed)))
            .chain(
                snapshot
                    .outputs
                    .iter()
                    .map(|o| format!("Z {} {} {}", o.id, o.pin, o.flags)),
            )
            .chain(
                snapshot
                    .sensors
                    .iter()
                    .map(|s| format!("S {} {} {}", s.id, s.pin, u8::from(s.pullup))),
            );
        for line in lines.take(limit) {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

impl SystemControl for MemoryStation {
    fn free_memory(&self) -> usize {
        self.free_memory
    }

    fn restart(&mut self) {
        // A simulated board cannot reset itself.
        warn!("restart requested");
        self.restarts += 1;
    }

    fn write_analogue(&mut self, vpin: i16, value: i16, profile: i16) {
        self.analogue.push((vpin, value, profile));
    }

    fn set_diagnostic(&mut self, channel: DiagChannel, on: bool) {
        self.diagnostics.set(channel, on);
    }

    fn motor_shield_name(&self) -> String {
        self.motor_shield.clone()
    }
}
