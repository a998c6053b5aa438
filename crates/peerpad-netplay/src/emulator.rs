//! Interface to the emulation collaborator.

use std::{future::Future, pin::Pin};

use bytes::Bytes;
use peerpad_netproto::PlatformId;
use thiserror::Error;

use crate::{config::InjectionStrategy, error::NetplayError, transport::MediaStream};

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    pub platform: PlatformId,
    pub rom_name: String,
    pub rom: Bytes,
}

#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("rendering surface is missing or detached")]
    SurfaceDetached,

    #[error("{0}")]
    Launch(String),

    #[error("{0}")]
    State(String),
}

impl From<EmulatorError> for NetplayError {
    fn from(e: EmulatorError) -> Self {
        match e {
            EmulatorError::SurfaceDetached => NetplayError::DeviceDetached,
            EmulatorError::Launch(detail) => NetplayError::LaunchFailure(detail),
            EmulatorError::State(detail) => NetplayError::Emulator(detail),
        }
    }
}

pub type LaunchFuture<H> = Pin<Box<dyn Future<Output = Result<H, EmulatorError>> + Send>>;

/// A running program.
pub trait EmulatorHandle: Send {
    fn exit(&mut self);

    fn restart(&mut self);

    fn save_state(&mut self) -> Result<Vec<u8>, EmulatorError>;

    fn load_state(&mut self, state: &[u8]) -> Result<(), EmulatorError>;

    /// The audio/video output to relay to the guest, if the emulator exposes one.
    fn media_stream(&self) -> Option<MediaStream> {
        None
    }
}

/// Launches programs. Input is observed through whichever polling path
/// [`Emulator::preferred_injection`] names; audio goes through the context
/// factory it was constructed with.
pub trait Emulator: Send {
    type Handle: EmulatorHandle + 'static;

    /// Start a launch. The returned future must not borrow the emulator.
    fn launch(&mut self, config: LaunchConfig) -> LaunchFuture<Self::Handle>;

    fn preferred_injection(&self) -> InjectionStrategy {
        InjectionStrategy::VirtualGamepad
    }

    /// False when the rendering surface is missing or detached.
    fn surface_attached(&self) -> bool {
        true
    }
}
