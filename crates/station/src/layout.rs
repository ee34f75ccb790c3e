//! Layout definitions: the turnouts, outputs, sensors and programming-track
//! decoder a [`MemoryStation`](crate::MemoryStation) starts with.

use std::collections::{BTreeMap, BTreeSet};

use dccex_core::{ParserConfig, TurnoutKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading or validating a layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// JSON deserialization failed.
    #[error("invalid layout JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A field value is out of its valid range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The name of the field that failed validation.
        field: String,
        /// A human-readable explanation of why the field value is invalid.
        reason: String,
    },
}

/// A model railway layout as seen by the command station.
///
/// # Example
/// ```
/// let layout = dccex_station::load_layout_from_str(r#"{
///     "id": "shed",
///     "schema_version": "1.0.0",
///     "turnouts": [{ "id": 1, "type": "dcc", "address": 5, "subaddress": 2 }],
///     "sensors": [{ "id": 7, "pin": 40, "pullup": true }]
/// }"#).unwrap();
/// assert_eq!(layout.turnouts.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Layout {
    /// Layout identifier.
    pub id: String,
    /// Layout schema version (e.g., `"1.0.0"`).
    pub schema_version: String,
    /// Motor shield name reported by `<s>`.
    #[serde(default = "default_motor_shield")]
    pub motor_shield: String,
    /// Both track drivers share one fault pin.
    #[serde(default)]
    pub common_fault_pin: bool,
    /// Free memory reported by `<D RAM>`, in bytes.
    #[serde(default = "default_free_memory")]
    pub free_memory: usize,
    /// Parser settings.
    #[serde(default)]
    pub parser: ParserConfig,
    /// Turnouts defined at start-up.
    #[serde(default)]
    pub turnouts: Vec<TurnoutDef>,
    /// Outputs defined at start-up.
    #[serde(default)]
    pub outputs: Vec<OutputDef>,
    /// Sensors defined at start-up.
    #[serde(default)]
    pub sensors: Vec<SensorDef>,
    /// Decoder sitting on the programming track, if any.
    #[serde(default)]
    pub decoder: Option<DecoderDef>,
}

fn default_motor_shield() -> String {
    "STANDARD_MOTOR_SHIELD".to_string()
}

fn default_free_memory() -> usize {
    2048
}

fn default_true() -> bool {
    true
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            id: "empty".to_string(),
            schema_version: "1.0.0".to_string(),
            motor_shield: default_motor_shield(),
            common_fault_pin: false,
            free_memory: default_free_memory(),
            parser: ParserConfig::default(),
            turnouts: Vec::new(),
            outputs: Vec::new(),
            sensors: Vec::new(),
            decoder: None,
        }
    }
}

/// A turnout definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnoutDef {
    /// Turnout id.
    pub id: i16,
    /// Initial state.
    #[serde(default = "default_true")]
    pub closed: bool,
    /// Drive type and settings.
    #[serde(flatten)]
    pub kind: TurnoutKind,
}

/// An output definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputDef {
    /// Output id.
    pub id: i16,
    /// Physical pin.
    pub pin: i16,
    /// Behaviour flags (0..=7).
    #[serde(default)]
    pub flags: u8,
}

/// A sensor definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SensorDef {
    /// Sensor id.
    pub id: i16,
    /// Physical pin.
    pub pin: i16,
    /// Pull-up enabled.
    #[serde(default)]
    pub pullup: bool,
}

/// A mobile decoder on the programming track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DecoderDef {
    /// Initial CV values, keyed by CV number (1..=1024).
    #[serde(default)]
    pub cvs: BTreeMap<u16, u8>,
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> LayoutError {
    LayoutError::InvalidField {
        field: field.into(),
        reason: reason.into(),
    }
}

fn check_unique(field: &str, ids: impl Iterator<Item = i16>) -> Result<(), LayoutError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id < 0 {
            return Err(invalid(field, format!("id {id} is negative")));
        }
        if !seen.insert(id) {
            return Err(invalid(field, format!("duplicate id {id}")));
        }
    }
    Ok(())
}

/// Load and validate a [`Layout`] from a JSON string.
///
/// The `id` and `schema_version` fields are required. Performs structural
/// validation after deserialization:
/// - `id` and `schema_version` must be non-empty
/// - turnout, output and sensor ids must be non-negative and unique
/// - DCC turnouts need address 1..=512 and subaddress 0..=3
/// - output flags must be in 0..=7
/// - decoder CV numbers must be in 1..=1024
/// - `parser.max_buffer` must be > 0
pub fn load_layout_from_str(s: &str) -> Result<Layout, LayoutError> {
    let layout: Layout = serde_json::from_str(s)?;

    if layout.id.trim().is_empty() {
        return Err(invalid("id", "must not be empty"));
    }
    if layout.schema_version.trim().is_empty() {
        return Err(invalid("schema_version", "must not be empty"));
    }
    if layout.parser.max_buffer == 0 {
        return Err(invalid("parser.max_buffer", "must be > 0"));
    }

    check_unique("turnouts", layout.turnouts.iter().map(|t| t.id))?;
    check_unique("outputs", layout.outputs.iter().map(|o| o.id))?;
    check_unique("sensors", layout.sensors.iter().map(|s| s.id))?;

    for t in &layout.turnouts {
        if let TurnoutKind::Dcc {
            address,
            subaddress,
        } = t.kind
        {
            if !(1..=512).contains(&address) {
                return Err(invalid(
                    format!("turnouts[{}].address", t.id),
                    format!("{address} outside 1..=512"),
                ));
            }
            if subaddress > 3 {
                return Err(invalid(
                    format!("turnouts[{}].subaddress", t.id),
                    format!("{subaddress} outside 0..=3"),
                ));
            }
        }
    }

    if let Some(o) = layout.outputs.iter().find(|o| o.flags > 7) {
        return Err(invalid(
            format!("outputs[{}].flags", o.id),
            format!("{} outside 0..=7", o.flags),
        ));
    }

    if let Some(decoder) = &layout.decoder
        && let Some(cv) = decoder.cvs.keys().find(|cv| !(1..=1024).contains(*cv))
    {
        return Err(invalid("decoder.cvs", format!("CV {cv} outside 1..=1024")));
    }

    Ok(layout)
}
