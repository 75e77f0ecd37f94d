use std::fmt::{Display, Formatter};

/// Lifecycle state of the live update channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Live updates were never requested.
    #[default]
    Idle,
    /// A connection attempt is in progress.
    Connecting,
    /// The channel is open and receiving updates.
    Connected,
    /// The channel is closed. It may be waiting for a scheduled reconnect.
    Closed,
}

impl Display for ChannelState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Idle => f.write_str("Idle"),
            ChannelState::Connecting => f.write_str("Connecting"),
            ChannelState::Connected => f.write_str("Connected"),
            ChannelState::Closed => f.write_str("Closed"),
        }
    }
}
