//! Wire types for the peerpad peer channel.
//!
//! - [`snapshot`]: normalized controller state
//! - [`messages`]: the tagged [`PeerMessage`] union
//! - [`codec`]: JSON text codec and length-prefixed stream framing

pub mod codec;
pub mod constants;
pub mod error;
pub mod messages;
pub mod snapshot;

pub use error::ProtoError;
pub use messages::{MessageKind, PeerMessage, PlatformId, RomLoad};
pub use snapshot::{Button, ControllerSnapshot};
