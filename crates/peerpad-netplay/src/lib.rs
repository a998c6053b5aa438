//! Peer-to-peer remote play session library.
//!
//! A host runs the emulation; a guest watches the relayed output and sends a
//! second controller's input back over an ordered message channel.
//!
//! # Architecture
//!
//! - [`session`]: Session role and state machine
//! - [`handler`]: Session controller, protocol dispatch and launch orchestration
//! - [`sampler`]: Local input sampling and the per-player key tables
//! - [`bridge`]: Edge detection between consecutive snapshots
//! - [`remote`]: Last-write-wins slot for the remote player's input
//! - [`injector`]: Making remote input visible to the emulator's own polling
//! - [`transport`] / [`emulator`]: Collaborator interfaces
//! - [`tcp_transport`]: Transport adapter over plain TCP
//! - [`error`]: Error types

pub mod bridge;
pub mod config;
pub mod emulator;
pub mod error;
pub mod handler;
pub mod idle;
pub mod injector;
pub mod remote;
pub mod sampler;
pub mod session;
pub mod tcp_transport;
pub mod transport;

// Re-export commonly used types
pub use bridge::{Edge, EdgeEvent, InputBridge, diff};
pub use config::{InjectionStrategy, NetplayConfig};
pub use emulator::{Emulator, EmulatorError, EmulatorHandle, LaunchConfig, LaunchFuture};
pub use error::NetplayError;
pub use handler::{SessionCommand, SessionController, SessionEvent};
pub use injector::{
    InputInjector, InputPlatform, build_injector,
    gamepad::{GamepadHook, GamepadSource, GamepadState, NoGamepads, VirtualGamepadInjector},
    keys::{KeyEvent, KeyEventKind, KeySink, KeyboardState, SyntheticKeyInjector},
};
pub use remote::LatestInput;
#[cfg(feature = "gilrs")]
pub use sampler::GamepadSampler;
pub use sampler::{InputSampler, KeyIdentity, KeyMap};
pub use session::{PeerSession, SessionRole, SessionState};
pub use tcp_transport::TcpTransport;
pub use transport::{MediaStream, Transport, TransportErrorKind, TransportEvent};
