//! Netplay error types.

use peerpad_netproto::ProtoError;
use thiserror::Error;

use crate::session::{SessionRole, SessionState};

#[derive(Error, Debug)]
pub enum NetplayError {
    #[error("remote peer is not reachable")]
    PeerUnavailable,

    #[error("local endpoint id could not be allocated")]
    IdUnavailable,

    #[error("transient transport error: {0}")]
    TransientTransport(String),

    #[error("connection failed: {0}")]
    UnknownConnection(String),

    #[error("rendering surface is missing or detached")]
    DeviceDetached,

    #[error("emulator failed to launch: {0}")]
    LaunchFailure(String),

    #[error("emulator error: {0}")]
    Emulator(String),

    #[error("input device unavailable: {0}")]
    InputDevice(String),

    #[error("no program is running")]
    NoProgram,

    #[error("a {0} is already in progress")]
    Busy(&'static str),

    #[error("{action} is not valid for the {role:?} role")]
    InvalidRole {
        action: &'static str,
        role: SessionRole,
    },

    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("not connected to a peer")]
    NotConnected,

    #[error("session is closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel send error")]
    ChannelSend,
}

impl NetplayError {
    /// Whether the UI should show this error. Transient transport trouble is
    /// recovered by the transport itself and only logged.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::TransientTransport(_) | Self::NotConnected)
    }
}
