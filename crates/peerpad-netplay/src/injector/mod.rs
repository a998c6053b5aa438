//! Remote input injection.
//!
//! The remote snapshot is made visible to the emulator through the same path
//! the emulator already polls: synthetic key events ([`keys`]) or a virtual
//! device in the connected-device list ([`gamepad`]). A session uses exactly
//! one of them.

pub mod gamepad;
pub mod keys;

use std::sync::Arc;

use peerpad_netproto::ControllerSnapshot;

use crate::config::InjectionStrategy;

use self::{
    gamepad::{GamepadHook, VirtualGamepadInjector},
    keys::{KeySink, SyntheticKeyInjector},
};

pub trait InputInjector: Send {
    fn strategy(&self) -> InjectionStrategy;

    /// Become the session the shared hooks serve.
    fn activate(&mut self) {}

    /// Inject the remote player's state for this tick. `None` means no remote
    /// player is present.
    fn apply(&mut self, snapshot: Option<&ControllerSnapshot>);

    /// Drop any injected state so nothing stays held.
    fn release(&mut self);
}

/// Process-wide input surfaces the injectors write into.
#[derive(Clone)]
pub struct InputPlatform {
    pub keys: Arc<dyn KeySink>,
    pub gamepads: Arc<GamepadHook>,
}

pub fn build_injector(
    strategy: InjectionStrategy,
    platform: &InputPlatform,
) -> Box<dyn InputInjector> {
    match strategy {
        InjectionStrategy::SyntheticKeys => {
            Box::new(SyntheticKeyInjector::new(platform.keys.clone()))
        }
        InjectionStrategy::VirtualGamepad => {
            Box::new(VirtualGamepadInjector::new(&platform.gamepads))
        }
    }
}
