use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::ControllerSnapshot;

/// Emulated platform identifier (e.g. `"snes"`, `"nes"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformId(String);

impl PlatformId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlatformId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RomLoad {
    pub name: String,
}

/// Fire-and-forget message exchanged over the peer channel.
///
/// Wire shape is `{ "type": <TAG>, "payload": <payload> }`. There are no
/// sequence numbers or acknowledgements.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    /// Guest -> Host: the guest's current controller state.
    Input(ControllerSnapshot),
    /// Host -> Guest: opaque placeholder-simulation state, echoed verbatim.
    StateUpdate(serde_json::Value),
    /// Either direction: switch the emulated platform.
    PlatformChange(PlatformId),
    /// Host -> Guest: name of the game now running.
    RomLoad(RomLoad),
}

impl PeerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Input(_) => MessageKind::Input,
            Self::StateUpdate(_) => MessageKind::StateUpdate,
            Self::PlatformChange(_) => MessageKind::PlatformChange,
            Self::RomLoad(_) => MessageKind::RomLoad,
        }
    }

    pub fn rom_load(name: impl Into<String>) -> Self {
        Self::RomLoad(RomLoad { name: name.into() })
    }
}

/// Payload-free tag of a [`PeerMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Input,
    StateUpdate,
    PlatformChange,
    RomLoad,
}

impl MessageKind {
    /// Wire tag, as found in the `type` field.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Input => "INPUT",
            Self::StateUpdate => "STATE_UPDATE",
            Self::PlatformChange => "PLATFORM_CHANGE",
            Self::RomLoad => "ROM_LOAD",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
