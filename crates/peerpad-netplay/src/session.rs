use peerpad_netproto::PlatformId;
use serde_json::Value;
use tracing::debug;

use crate::error::NetplayError;

/// Role of the local participant. Fixed once a session is created or joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionRole {
    #[default]
    None,
    /// Runs the emulation and relays its output.
    Host,
    /// Renders the relayed output and sends the second controller's input.
    Guest,
}

/// Peer session state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session created or joined yet.
    #[default]
    Idle,
    /// Endpoint requested or connection (re-)establishing.
    Connecting,
    /// Message channel to the peer is open.
    Connected,
    /// Torn down. Terminal.
    Closed,
}

impl SessionState {
    fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Connecting) | (Connecting, Connected) | (Connected, Connecting) => true,
            _ => false,
        }
    }
}

/// Peer session context.
///
/// Holds the role, connection metadata and the game-facing flags the
/// controller derives from protocol messages.
#[derive(Debug, Default)]
pub struct PeerSession {
    role: SessionRole,
    state: SessionState,

    /// Published local endpoint id. Kept across reconnects.
    pub local_id: Option<String>,

    /// Id of the connected (or last connected) peer.
    pub remote_id: Option<String>,

    /// Whether the second player is currently connected.
    pub peer_connected: bool,

    /// Platform the emulation collaborator is configured for.
    pub platform: PlatformId,

    /// Name of the loaded ROM, `None` while nothing is loaded.
    pub rom_name: Option<String>,

    /// Guest only: whether the remote emulation is confirmed running.
    pub remote_running: bool,

    /// Guest only: last placeholder state received from the host.
    pub fallback_state: Option<Value>,
}

impl PeerSession {
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            ..Self::default()
        }
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn has_rom(&self) -> bool {
        self.rom_name.is_some()
    }

    fn transition(&mut self, next: SessionState) -> Result<(), NetplayError> {
        if !self.state.can_transition_to(next) {
            return Err(NetplayError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "session state transition");
        self.state = next;
        Ok(())
    }

    /// Assume the host role and start waiting for a peer.
    pub fn create(&mut self) -> Result<(), NetplayError> {
        if self.role != SessionRole::None {
            return Err(NetplayError::InvalidRole {
                action: "create",
                role: self.role,
            });
        }
        self.transition(SessionState::Connecting)?;
        self.role = SessionRole::Host;
        Ok(())
    }

    /// Assume the guest role and start connecting to `remote_id`.
    ///
    /// A guest whose previous attempt failed may retry while still connecting.
    pub fn join(&mut self, remote_id: &str) -> Result<(), NetplayError> {
        match (self.role, self.state) {
            (SessionRole::None, _) => {
                self.transition(SessionState::Connecting)?;
                self.role = SessionRole::Guest;
            }
            (SessionRole::Guest, SessionState::Connecting) => {}
            (role, _) => {
                return Err(NetplayError::InvalidRole {
                    action: "join",
                    role,
                });
            }
        }
        self.remote_id = Some(remote_id.to_string());
        Ok(())
    }

    /// The transport allocated the local endpoint. Returns false if an id
    /// was already published; the first one is kept.
    pub fn on_ready(&mut self, id: &str) -> bool {
        if self.local_id.is_some() {
            return false;
        }
        self.local_id = Some(id.to_string());
        true
    }

    /// A message channel to the peer opened. Returns false if the session was
    /// already connected, in which case nothing changes.
    pub fn on_open(&mut self, remote_id: &str) -> Result<bool, NetplayError> {
        if self.state == SessionState::Connected {
            return Ok(false);
        }
        self.transition(SessionState::Connected)?;
        self.remote_id = Some(remote_id.to_string());
        self.peer_connected = true;
        Ok(true)
    }

    /// The peer's channel closed or the signaling link dropped. Role, ids and
    /// the loaded game are kept.
    pub fn on_peer_lost(&mut self) -> Result<(), NetplayError> {
        self.peer_connected = false;
        self.remote_running = false;
        if self.state == SessionState::Connected {
            self.transition(SessionState::Connecting)?;
        }
        Ok(())
    }

    /// Enter the terminal state. Returns false if already closed.
    pub fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        self.peer_connected = false;
        true
    }
}
