//! Host-side pieces for running the DCC-EX command front end without
//! hardware: a JSON layout format, an in-memory [`MemoryStation`] that
//! implements every collaborator trait of `dccex_core`, a simulated
//! programming track, and an in-memory client table for deferred replies.

#![warn(missing_docs)]

mod layout;
mod programmer;
mod ring;
mod station;

pub use layout::{
    DecoderDef, Layout, LayoutError, OutputDef, SensorDef, TurnoutDef, load_layout_from_str,
};
pub use programmer::{Decoder, Programmer};
pub use ring::{ClientTable, SharedRing};
pub use station::{AccessoryCommand, LocoState, MemoryStation, ScheduledPacket};
