//! Interface to the peer transport: an ordered message channel plus a
//! one-way media channel.

use peerpad_netproto::PeerMessage;

use crate::error::NetplayError;

/// Opaque handle to an audio/video stream carried by the media channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    pub id: String,
}

/// Raw error classes a transport reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    PeerUnavailable,
    IdUnavailable,
    Network,
    ServerError,
    SocketError,
    SocketClosed,
    Other(String),
}

impl TransportErrorKind {
    /// Network/server/socket trouble the transport reconnects from on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::ServerError | Self::SocketError | Self::SocketClosed
        )
    }

    pub fn classify(self) -> NetplayError {
        match self {
            Self::PeerUnavailable => NetplayError::PeerUnavailable,
            Self::IdUnavailable => NetplayError::IdUnavailable,
            Self::Other(detail) => NetplayError::UnknownConnection(detail),
            transient => NetplayError::TransientTransport(format!("{transient:?}")),
        }
    }
}

/// Events delivered by a transport to the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The local endpoint is allocated and can be published.
    Ready { id: String },
    /// A message channel to the peer is open.
    Open { remote_id: String },
    /// A message arrived on the channel.
    Data(PeerMessage),
    /// The peer's message channel closed.
    Close,
    /// The signaling connection dropped. `recoverable` means the transport
    /// is reconnecting by itself.
    Disconnected { recoverable: bool },
    Error(TransportErrorKind),
    /// The peer started relaying a media stream to us.
    Stream(MediaStream),
}

/// Commands a session controller issues to its transport.
///
/// Calls return immediately; outcomes arrive later as [`TransportEvent`]s on
/// the channel the transport was constructed with.
pub trait Transport: Send {
    /// Allocate a local endpoint and wait for incoming connections.
    fn create_endpoint(&mut self) -> Result<(), NetplayError>;

    /// Request a connection to `remote_id`.
    fn connect(&mut self, remote_id: &str) -> Result<(), NetplayError>;

    /// Send one message. Delivery is ordered but not acknowledged.
    fn send(&mut self, msg: &PeerMessage) -> Result<(), NetplayError>;

    /// Start relaying `stream` to the connected peer.
    fn call(&mut self, stream: &MediaStream) -> Result<(), NetplayError>;

    /// Stop any media relay started with [`Transport::call`].
    fn hang_up(&mut self);

    /// Release the endpoint and every connection.
    fn close(&mut self);
}
