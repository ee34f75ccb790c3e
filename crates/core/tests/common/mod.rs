//! Shared test helpers for `dccex_core` integration tests.

#![allow(unreachable_pub)]
#![allow(dead_code)]

use std::io::{self, Write};

use dccex_core::diag::DiagChannel;
use dccex_core::{
    CompletionKind, CurrentReading, Dispatcher, EepromCounts, EepromStore, LocoControl,
    OutputInfo, OutputRegistry, Outcome, PowerMode, ProgrammingTrack, ReplyTarget, SensorChange,
    SensorInfo, SensorRegistry, StreamId, SystemControl, Track, TrackControl, TurnoutInfo,
    TurnoutKind, TurnoutRegistry,
};

/// One call made on the station, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Throttle { cab: i16, speed: u8, forward: bool },
    Function { cab: i16, function: i16, on: bool },
    Forget(i16),
    ForgetAll,
    WriteCvMain { cab: i16, cv: i16, value: i16 },
    WriteCvBitMain { cab: i16, cv: i16, bit: i16, value: i16 },
    Accessory { address: u16, subaddress: u8, activate: bool },
    SpeedSteps(u8),
    Power(Track, PowerMode),
    SyncMain(bool),
    Boost(bool),
    Packet { track: Track, bytes: Vec<u8>, repeats: u8 },
    AckLimit(i16),
    AckMin(i16),
    AckMax(i16),
    Prog { op: &'static str, args: Vec<i16>, done: CompletionKind },
    Restart,
    Analogue { vpin: i16, value: i16, profile: i16 },
    Diagnostic(DiagChannel, bool),
    ClearEeprom,
}

/// In-memory station that records every call.
#[derive(Debug, Default)]
pub struct RecordingStation {
    pub calls: Vec<Call>,
    pub main_power: PowerMode,
    pub prog_power: PowerMode,
    pub common_fault_pin: bool,
    pub turnouts: Vec<TurnoutInfo>,
    pub outputs: Vec<OutputInfo>,
    pub sensors: Vec<SensorInfo>,
    pub pending_changes: Vec<SensorChange>,
    pub refuse_create: bool,
}

impl RecordingStation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls other than power/sync bookkeeping.
    pub fn prog_calls(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Prog { .. }))
            .collect()
    }
}

impl LocoControl for RecordingStation {
    fn set_throttle(&mut self, cab: i16, speed: u8, forward: bool) {
        self.calls.push(Call::Throttle { cab, speed, forward });
    }
    fn set_function(&mut self, cab: i16, function: i16, on: bool) {
        self.calls.push(Call::Function { cab, function, on });
    }
    fn forget_loco(&mut self, cab: i16) {
        self.calls.push(Call::Forget(cab));
    }
    fn forget_all_locos(&mut self) {
        self.calls.push(Call::ForgetAll);
    }
    fn write_cv_byte_main(&mut self, cab: i16, cv: i16, value: i16) {
        self.calls.push(Call::WriteCvMain { cab, cv, value });
    }
    fn write_cv_bit_main(&mut self, cab: i16, cv: i16, bit: i16, value: i16) {
        self.calls.push(Call::WriteCvBitMain { cab, cv, bit, value });
    }
    fn set_accessory(&mut self, address: u16, subaddress: u8, activate: bool) {
        self.calls.push(Call::Accessory {
            address,
            subaddress,
            activate,
        });
    }
    fn set_global_speed_steps(&mut self, steps: u8) {
        self.calls.push(Call::SpeedSteps(steps));
    }
    fn display_cab_list(&mut self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "<* Used=0, max=50 *>")
    }
}

impl TrackControl for RecordingStation {
    fn set_power(&mut self, track: Track, mode: PowerMode) {
        match track {
            Track::Main => self.main_power = mode,
            Track::Prog => self.prog_power = mode,
        }
        self.calls.push(Call::Power(track, mode));
    }
    fn power(&self, track: Track) -> PowerMode {
        match track {
            Track::Main => self.main_power,
            Track::Prog => self.prog_power,
        }
    }
    fn set_prog_track_sync_main(&mut self, on: bool) {
        self.calls.push(Call::SyncMain(on));
    }
    fn set_prog_track_boost(&mut self, on: bool) {
        self.calls.push(Call::Boost(on));
    }
    fn common_fault_pin(&self) -> bool {
        self.common_fault_pin
    }
    fn schedule_packet(&mut self, track: Track, packet: &[u8], repeats: u8) {
        self.calls.push(Call::Packet {
            track,
            bytes: packet.to_vec(),
            repeats,
        });
    }
    fn current(&self, _track: Track) -> CurrentReading {
        CurrentReading {
            current_ma: 120,
            max_ma: 3000,
            trip_ma: 2500,
            raw: 41,
        }
    }
    fn set_ack_limit(&mut self, milliamps: i16) {
        self.calls.push(Call::AckLimit(milliamps));
    }
    fn set_min_ack_pulse(&mut self, micros: i16) {
        self.calls.push(Call::AckMin(micros));
    }
    fn set_max_ack_pulse(&mut self, micros: i16) {
        self.calls.push(Call::AckMax(micros));
    }
}

impl ProgrammingTrack for RecordingStation {
    fn write_cv_byte(&mut self, cv: i16, value: i16, done: CompletionKind) {
        self.calls.push(Call::Prog { op: "write_cv_byte", args: vec![cv, value], done });
    }
    fn write_cv_bit(&mut self, cv: i16, bit: i16, value: i16, done: CompletionKind) {
        self.calls.push(Call::Prog { op: "write_cv_bit", args: vec![cv, bit, value], done });
    }
    fn verify_cv_byte(&mut self, cv: i16, value: i16, done: CompletionKind) {
        self.calls.push(Call::Prog { op: "verify_cv_byte", args: vec![cv, value], done });
    }
    fn verify_cv_bit(&mut self, cv: i16, bit: i16, value: i16, done: CompletionKind) {
        self.calls.push(Call::Prog { op: "verify_cv_bit", args: vec![cv, bit, value], done });
    }
    fn read_cv(&mut self, cv: i16, done: CompletionKind) {
        self.calls.push(Call::Prog { op: "read_cv", args: vec![cv], done });
    }
    fn get_loco_id(&mut self, done: CompletionKind) {
        self.calls.push(Call::Prog { op: "get_loco_id", args: vec![], done });
    }
    fn set_loco_id(&mut self, id: i16, done: CompletionKind) {
        self.calls.push(Call::Prog { op: "set_loco_id", args: vec![id], done });
    }
}

impl TurnoutRegistry for RecordingStation {
    fn turnouts(&self) -> Vec<TurnoutInfo> {
        self.turnouts.clone()
    }
    fn create_turnout(&mut self, id: i16, kind: TurnoutKind) -> bool {
        if self.refuse_create {
            return false;
        }
        self.turnouts.retain(|t| t.id != id);
        self.turnouts.push(TurnoutInfo { id, kind, closed: true });
        true
    }
    fn remove_turnout(&mut self, id: i16) -> bool {
        let before = self.turnouts.len();
        self.turnouts.retain(|t| t.id != id);
        self.turnouts.len() != before
    }
    fn set_turnout_closed(&mut self, id: i16, closed: bool) -> bool {
        match self.turnouts.iter_mut().find(|t| t.id == id) {
            Some(t) => {
                t.closed = closed;
                true
            }
            None => false,
        }
    }
}

impl OutputRegistry for RecordingStation {
    fn outputs(&self) -> Vec<OutputInfo> {
        self.outputs.clone()
    }
    fn create_output(&mut self, id: i16, pin: i16, flags: u8) -> bool {
        if self.refuse_create {
            return false;
        }
        self.outputs.retain(|o| o.id != id);
        self.outputs.push(OutputInfo {
            id,
            pin,
            flags,
            active: false,
        });
        true
    }
    fn remove_output(&mut self, id: i16) -> bool {
        let before = self.outputs.len();
        self.outputs.retain(|o| o.id != id);
        self.outputs.len() != before
    }
    fn activate_output(&mut self, id: i16, state: i16) -> bool {
        match self.outputs.iter_mut().find(|o| o.id == id) {
            Some(o) => {
                o.active = state != 0;
                true
            }
            None => false,
        }
    }
}

impl SensorRegistry for RecordingStation {
    fn sensors(&self) -> Vec<SensorInfo> {
        self.sensors.clone()
    }
    fn create_sensor(&mut self, id: i16, pin: i16, pullup: i16) -> bool {
        if self.refuse_create {
            return false;
        }
        self.sensors.retain(|s| s.id != id);
        self.sensors.push(SensorInfo {
            id,
            pin,
            pullup: pullup != 0,
            active: false,
        });
        true
    }
    fn remove_sensor(&mut self, id: i16) -> bool {
        let before = self.sensors.len();
        self.sensors.retain(|s| s.id != id);
        self.sensors.len() != before
    }
    fn sensor_changes(&mut self) -> Vec<SensorChange> {
        std::mem::take(&mut self.pending_changes)
    }
}

impl EepromStore for RecordingStation {
    fn store_eeprom(&mut self) -> EepromCounts {
        EepromCounts {
            turnouts: self.turnouts.len() as u16,
            sensors: self.sensors.len() as u16,
            outputs: self.outputs.len() as u16,
        }
    }
    fn clear_eeprom(&mut self) {
        self.calls.push(Call::ClearEeprom);
    }
    fn dump_eeprom(&mut self, out: &mut dyn Write, entries: i16) -> io::Result<()> {
        writeln!(out, "EEPROM dump {entries}")
    }
}

impl SystemControl for RecordingStation {
    fn free_memory(&self) -> usize {
        1234
    }
    fn restart(&mut self) {
        self.calls.push(Call::Restart);
    }
    fn write_analogue(&mut self, vpin: i16, value: i16, profile: i16) {
        self.calls.push(Call::Analogue {
            vpin,
            value,
            profile,
        });
    }
    fn set_diagnostic(&mut self, channel: DiagChannel, on: bool) {
        self.calls.push(Call::Diagnostic(channel, on));
    }
    fn motor_shield_name(&self) -> String {
        "STANDARD_MOTOR_SHIELD".to_string()
    }
}

/// Dispatch `cmd` as if it came from stream 1 and return the reply text.
pub fn run(dispatcher: &mut Dispatcher, station: &mut RecordingStation, cmd: &str) -> String {
    run_on(dispatcher, station, StreamId(1), cmd).1
}

/// Dispatch `cmd` from stream `id`, returning the outcome and reply text.
pub fn run_on(
    dispatcher: &mut Dispatcher,
    station: &mut RecordingStation,
    id: StreamId,
    cmd: &str,
) -> (Outcome, String) {
    let mut out = Vec::new();
    let outcome = {
        let mut reply = ReplyTarget::stream(id, &mut out);
        dispatcher
            .dispatch(&mut reply, cmd.as_bytes(), station)
            .expect("in-memory reply write cannot fail")
    };
    (outcome, String::from_utf8(out).expect("replies are ASCII"))
}
