//! Diagnostic channels switched by `<D ...>` commands.

/// A diagnostic output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagChannel {
    /// Programming-track acknowledgement detection.
    Ack,
    /// Command parsing.
    Cmd,
    /// WiFi transport.
    Wifi,
    /// Ethernet transport.
    Ethernet,
    /// WiThrottle protocol.
    WiThrottle,
    /// LCN bus.
    Lcn,
}

impl DiagChannel {
    /// Every channel, in bit order.
    pub const ALL: [DiagChannel; 6] = [
        DiagChannel::Ack,
        DiagChannel::Cmd,
        DiagChannel::Wifi,
        DiagChannel::Ethernet,
        DiagChannel::WiThrottle,
        DiagChannel::Lcn,
    ];

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of enabled diagnostic channels. All off by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagFlags {
    bits: u8,
}

impl DiagFlags {
    /// Whether `channel` is on.
    pub fn is_on(self, channel: DiagChannel) -> bool {
        self.bits & channel.bit() != 0
    }

    /// Switch `channel`.
    pub fn set(&mut self, channel: DiagChannel, on: bool) {
        if on {
            self.bits |= channel.bit();
        } else {
            self.bits &= !channel.bit();
        }
    }

    /// The channels currently on.
    pub fn enabled(self) -> impl Iterator<Item = DiagChannel> {
        DiagChannel::ALL.into_iter().filter(move |c| self.is_on(*c))
    }
}
