//! Configuration for the command front end.

/// Parser and dispatcher settings.
///
/// Defaults match a stock command station build: a 50-byte command buffer,
/// raw packets sent three times, and the modern turnout convention where
/// `<T id 1>` closes.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParserConfig {
    /// Largest command payload kept between `<` and `>`; longer commands
    /// are discarded.
    pub max_buffer: usize,
    /// Transmission count for `<M>` / `<P>` raw packets.
    pub packet_repeats: u8,
    /// Legacy turnout convention: `<T id 1>` throws and `<T id 0>` closes.
    pub classic_turnout_commands: bool,
    /// Size of the loco speed reminder table, reported by `<#>`.
    pub max_locos: u16,
    /// Firmware version reported by `<s>`.
    pub version: String,
    /// Board name reported by `<s>`.
    pub board: String,
    /// Build revision reported by `<s>`.
    pub build_sha: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_buffer: 50,
            packet_repeats: 3,
            classic_turnout_commands: false,
            max_locos: 50,
            version: env!("CARGO_PKG_VERSION").to_string(),
            board: "HOST".to_string(),
            build_sha: "unknown".to_string(),
        }
    }
}
