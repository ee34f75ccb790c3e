//! Collaborator interfaces.
//!
//! The dispatcher knows nothing about track electronics, persistence, or the
//! registries of turnouts, outputs and sensors. It reaches them through the
//! traits below, bundled as [`CommandStation`]. Any type implementing every
//! part is a `CommandStation` through the blanket impl.

use std::fmt;
use std::io::{self, Write};

use crate::diag::DiagChannel;
use crate::stash::CompletionKind;

/// A track output of the command station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Track {
    /// The main operating track.
    Main,
    /// The programming track.
    Prog,
}

/// Power state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerMode {
    /// Track power off.
    #[default]
    Off,
    /// Track power on.
    On,
    /// Power cut by the overload detector.
    Overload,
}

/// Current-sense reading for the `<c>` meter reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentReading {
    /// Present current in milliamps.
    pub current_ma: i32,
    /// Maximum current the driver can supply, in milliamps.
    pub max_ma: i32,
    /// Trip threshold in milliamps.
    pub trip_ma: i32,
    /// Raw ADC reading scaled to 0..=1024.
    pub raw: i32,
}

/// How a turnout is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum TurnoutKind {
    /// DCC accessory decoder output.
    Dcc {
        /// Accessory address (1..=512).
        address: u16,
        /// Sub-address (0..=3).
        subaddress: u8,
    },
    /// Servo on a virtual pin.
    Servo {
        /// Virtual pin of the servo driver.
        vpin: u16,
        /// Position when thrown.
        thrown_position: u16,
        /// Position when closed.
        closed_position: u16,
        /// Motion profile.
        profile: u8,
    },
    /// Plain digital virtual pin.
    Vpin {
        /// The virtual pin.
        vpin: u16,
    },
}

impl fmt::Display for TurnoutKind {
    /// The type keyword and settings as they appear in `<T>` listings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnoutKind::Dcc {
                address,
                subaddress,
            } => write!(f, "DCC {address} {subaddress}"),
            TurnoutKind::Servo {
                vpin,
                thrown_position,
                closed_position,
                profile,
            } => write!(
                f,
                "SERVO {vpin} {thrown_position} {closed_position} {profile}"
            ),
            TurnoutKind::Vpin { vpin } => write!(f, "VPIN {vpin}"),
        }
    }
}

/// A turnout definition and its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnoutInfo {
    /// Turnout id.
    pub id: i16,
    /// Drive type and its settings.
    pub kind: TurnoutKind,
    /// Whether the turnout is closed (not thrown).
    pub closed: bool,
}

/// An output definition and its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInfo {
    /// Output id.
    pub id: i16,
    /// Physical pin.
    pub pin: i16,
    /// Behaviour flags (invert, restore-on-boot).
    pub flags: u8,
    /// Current state.
    pub active: bool,
}

/// A sensor definition and its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorInfo {
    /// Sensor id.
    pub id: i16,
    /// Physical pin.
    pub pin: i16,
    /// Pull-up enabled.
    pub pullup: bool,
    /// Current (debounced) state.
    pub active: bool,
}

/// A sensor state change found by a periodic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorChange {
    /// Sensor id.
    pub id: i16,
    /// New state.
    pub active: bool,
}

/// Number of objects written by an EEPROM store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EepromCounts {
    /// Turnouts stored.
    pub turnouts: u16,
    /// Sensors stored.
    pub sensors: u16,
    /// Outputs stored.
    pub outputs: u16,
}

/// Locomotive and accessory control on the main track.
pub trait LocoControl {
    /// Set speed (0 stop, 1 emergency stop, 2..=127 running) and direction.
    fn set_throttle(&mut self, cab: i16, speed: u8, forward: bool);
    /// Switch one decoder function.
    fn set_function(&mut self, cab: i16, function: i16, on: bool);
    /// Drop one loco from the speed reminder table.
    fn forget_loco(&mut self, cab: i16);
    /// Drop every loco from the speed reminder table.
    fn forget_all_locos(&mut self);
    /// Write a CV byte on the main track (no acknowledgement).
    fn write_cv_byte_main(&mut self, cab: i16, cv: i16, value: i16);
    /// Write a CV bit on the main track (no acknowledgement).
    fn write_cv_bit_main(&mut self, cab: i16, cv: i16, bit: i16, value: i16);
    /// Send an accessory decoder packet.
    fn set_accessory(&mut self, address: u16, subaddress: u8, activate: bool);
    /// Set the speed-step mode used for all locos (28 or 128).
    fn set_global_speed_steps(&mut self, steps: u8);
    /// Write the speed reminder table to `out`.
    fn display_cab_list(&mut self, out: &mut dyn Write) -> io::Result<()>;
}

/// Track power, packet scheduling and current sensing.
pub trait TrackControl {
    /// Switch a track's power.
    fn set_power(&mut self, track: Track, mode: PowerMode);
    /// A track's power state.
    fn power(&self, track: Track) -> PowerMode;
    /// Drive the programming track from the main signal.
    fn set_prog_track_sync_main(&mut self, on: bool);
    /// Lift the programming-track current limit.
    fn set_prog_track_boost(&mut self, on: bool);
    /// Whether both drivers share one fault pin (tracks cannot be switched
    /// individually).
    fn common_fault_pin(&self) -> bool;
    /// Queue a raw DCC packet for transmission `repeats` times.
    fn schedule_packet(&mut self, track: Track, packet: &[u8], repeats: u8);
    /// Current-sense reading for a track.
    fn current(&self, track: Track) -> CurrentReading;
    /// Acknowledgement detection threshold in milliamps.
    fn set_ack_limit(&mut self, milliamps: i16);
    /// Shortest accepted acknowledgement pulse in microseconds.
    fn set_min_ack_pulse(&mut self, micros: i16);
    /// Longest accepted acknowledgement pulse in microseconds.
    fn set_max_ack_pulse(&mut self, micros: i16);
}

/// Acknowledged programming-track operations.
///
/// Each call starts an operation and returns immediately. When it finishes,
/// the host must call [`Dispatcher::complete`](crate::Dispatcher::complete)
/// exactly once with the given `done` kind and a result code (1 = success
/// for writes, the value read for reads, -1 = failure).
pub trait ProgrammingTrack {
    /// Write a CV byte.
    fn write_cv_byte(&mut self, cv: i16, value: i16, done: CompletionKind);
    /// Write a single CV bit.
    fn write_cv_bit(&mut self, cv: i16, bit: i16, value: i16, done: CompletionKind);
    /// Verify a CV byte, reporting the actual value.
    fn verify_cv_byte(&mut self, cv: i16, value: i16, done: CompletionKind);
    /// Verify a CV bit, reporting the actual bit.
    fn verify_cv_bit(&mut self, cv: i16, bit: i16, value: i16, done: CompletionKind);
    /// Read a CV byte.
    fn read_cv(&mut self, cv: i16, done: CompletionKind);
    /// Read the loco address.
    fn get_loco_id(&mut self, done: CompletionKind);
    /// Write a new loco address (short or long).
    fn set_loco_id(&mut self, id: i16, done: CompletionKind);
}

/// Turnout definitions.
pub trait TurnoutRegistry {
    /// All turnouts, in definition order.
    fn turnouts(&self) -> Vec<TurnoutInfo>;
    /// Define a turnout. Returns `false` if the registry refuses.
    fn create_turnout(&mut self, id: i16, kind: TurnoutKind) -> bool;
    /// Delete a turnout. Returns `false` if it does not exist.
    fn remove_turnout(&mut self, id: i16) -> bool;
    /// Close or throw a turnout. Returns `false` if it does not exist.
    fn set_turnout_closed(&mut self, id: i16, closed: bool) -> bool;
}

/// Output definitions.
pub trait OutputRegistry {
    /// All outputs, in definition order.
    fn outputs(&self) -> Vec<OutputInfo>;
    /// Define an output. Returns `false` if the registry refuses.
    fn create_output(&mut self, id: i16, pin: i16, flags: u8) -> bool;
    /// Delete an output. Returns `false` if it does not exist.
    fn remove_output(&mut self, id: i16) -> bool;
    /// Set an output's state. Returns `false` if it does not exist.
    fn activate_output(&mut self, id: i16, state: i16) -> bool;
}

/// Sensor definitions and polling.
pub trait SensorRegistry {
    /// All sensors, in definition order.
    fn sensors(&self) -> Vec<SensorInfo>;
    /// Define a sensor. Returns `false` if the registry refuses.
    fn create_sensor(&mut self, id: i16, pin: i16, pullup: i16) -> bool;
    /// Delete a sensor. Returns `false` if it does not exist.
    fn remove_sensor(&mut self, id: i16) -> bool;
    /// State changes since the previous call.
    fn sensor_changes(&mut self) -> Vec<SensorChange>;
}

/// Persistent storage of the registries.
pub trait EepromStore {
    /// Persist all registries.
    fn store_eeprom(&mut self) -> EepromCounts;
    /// Erase the persisted registries.
    fn clear_eeprom(&mut self);
    /// Write the first `entries` stored records to `out`.
    fn dump_eeprom(&mut self, out: &mut dyn Write, entries: i16) -> io::Result<()>;
}

/// Board-level services.
pub trait SystemControl {
    /// Low-water mark of free memory in bytes.
    fn free_memory(&self) -> usize;
    /// Request a watchdog restart. Returns if the restart did not happen.
    fn restart(&mut self);
    /// Write an analogue value (servo position) to a virtual pin.
    fn write_analogue(&mut self, vpin: i16, value: i16, profile: i16);
    /// Switch a diagnostic channel.
    fn set_diagnostic(&mut self, channel: DiagChannel, on: bool);
    /// Name of the fitted motor shield.
    fn motor_shield_name(&self) -> String;
}

/// Everything the dispatcher talks to.
pub trait CommandStation:
    LocoControl
    + TrackControl
    + ProgrammingTrack
    + TurnoutRegistry
    + OutputRegistry
    + SensorRegistry
    + EepromStore
    + SystemControl
{
}

impl<T> CommandStation for T where
    T: LocoControl
        + TrackControl
        + ProgrammingTrack
        + TurnoutRegistry
        + OutputRegistry
        + SensorRegistry
        + EepromStore
        + SystemControl
        + ?Sized
{
}
