//! Virtual polled-device strategy.
//!
//! [`GamepadHook`] stands between the emulator and the platform's connected
//! device list. While a remote snapshot is available it splices one synthetic
//! pad into the list at a reserved index and passes every other slot through
//! from the real source.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Instant;

use parking_lot::Mutex;
use peerpad_netproto::{Button, ControllerSnapshot};
use tracing::{debug, info};

use crate::{config::InjectionStrategy, injector::InputInjector};

/// Device list index reserved for the remote player's pad.
pub const DEFAULT_VIRTUAL_PAD_INDEX: usize = 1;

pub const VIRTUAL_PAD_ID: &str = "peerpad remote player (virtual)";

/// Standard-mapping button order. `None` marks slots the shared controller
/// has no button for (triggers, stick clicks).
pub const STANDARD_LAYOUT: [Option<Button>; 16] = [
    Some(Button::B),
    Some(Button::A),
    Some(Button::Y),
    Some(Button::X),
    Some(Button::L),
    Some(Button::R),
    None,
    None,
    Some(Button::Select),
    Some(Button::Start),
    None,
    None,
    Some(Button::Up),
    Some(Button::Down),
    Some(Button::Left),
    Some(Button::Right),
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GamepadButton {
    pub pressed: bool,
    pub value: f32,
}

impl GamepadButton {
    fn from_pressed(pressed: bool) -> Self {
        Self {
            pressed,
            value: if pressed { 1.0 } else { 0.0 },
        }
    }
}

/// One entry of the polled device list.
#[derive(Debug, Clone, PartialEq)]
pub struct GamepadState {
    pub id: String,
    pub index: usize,
    pub connected: bool,
    /// Milliseconds since the hook was created.
    pub timestamp_ms: f64,
    pub mapping: &'static str,
    pub buttons: Vec<GamepadButton>,
    pub axes: Vec<f32>,
}

/// Axis 0 is horizontal, axis 1 vertical. When both opposite directions are
/// held, left and up win.
pub fn axes_for(snapshot: &ControllerSnapshot) -> [f32; 2] {
    let horizontal = if snapshot.left {
        -1.0
    } else if snapshot.right {
        1.0
    } else {
        0.0
    };
    let vertical = if snapshot.up {
        -1.0
    } else if snapshot.down {
        1.0
    } else {
        0.0
    };
    [horizontal, vertical]
}

/// Project a snapshot into the device shape. Built fresh on every call.
pub fn project(snapshot: &ControllerSnapshot, index: usize, timestamp_ms: f64) -> GamepadState {
    GamepadState {
        id: VIRTUAL_PAD_ID.to_string(),
        index,
        connected: true,
        timestamp_ms,
        mapping: "standard",
        buttons: STANDARD_LAYOUT
            .iter()
            .map(|slot| GamepadButton::from_pressed(slot.is_some_and(|b| snapshot.is_pressed(b))))
            .collect(),
        axes: axes_for(snapshot).to_vec(),
    }
}

/// The platform's connected-device query. Empty slots are `None`.
pub trait GamepadSource: Send + Sync {
    fn gamepads(&self) -> Vec<Option<GamepadState>>;
}

/// A source with no real devices attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGamepads;

impl GamepadSource for NoGamepads {
    fn gamepads(&self) -> Vec<Option<GamepadState>> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
struct PadSlot {
    snapshot: Mutex<Option<ControllerSnapshot>>,
}

/// Process-wide interception of the device-list query.
///
/// Shared by every session. Only the registration marked active is
/// spliced in.
pub struct GamepadHook {
    real: Arc<dyn GamepadSource>,
    reserved_index: usize,
    installed: AtomicBool,
    active: Mutex<Option<Arc<PadSlot>>>,
    epoch: Instant,
}

impl GamepadHook {
    pub fn new(real: Arc<dyn GamepadSource>, reserved_index: usize) -> Self {
        Self {
            real,
            reserved_index,
            installed: AtomicBool::new(false),
            active: Mutex::new(None),
            epoch: Instant::now(),
        }
    }

    pub fn reserved_index(&self) -> usize {
        self.reserved_index
    }

    /// Start intercepting. Returns false if already installed.
    pub fn install(&self) -> bool {
        let fresh = self
            .installed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if fresh {
            info!(index = self.reserved_index, "device list hook installed");
        } else {
            debug!("device list hook already installed");
        }
        fresh
    }

    /// Stop intercepting. Returns false if it was not installed.
    pub fn uninstall(&self) -> bool {
        self.installed.swap(false, Ordering::AcqRel)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Create a per-session registration. It is not served until
    /// [`PadRegistration::activate`] is called.
    pub fn register(self: &Arc<Self>) -> PadRegistration {
        PadRegistration {
            hook: self.clone(),
            slot: Arc::new(PadSlot::default()),
        }
    }

    fn active_snapshot(&self) -> Option<ControllerSnapshot> {
        let active = self.active.lock();
        active.as_ref().and_then(|slot| *slot.snapshot.lock())
    }

    fn timestamp_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1_000.0
    }
}

impl GamepadSource for GamepadHook {
    fn gamepads(&self) -> Vec<Option<GamepadState>> {
        let mut pads = self.real.gamepads();
        if !self.is_installed() {
            return pads;
        }
        let Some(snapshot) = self.active_snapshot() else {
            return pads;
        };

        let index = self.reserved_index;
        if pads.len() <= index {
            pads.resize(index + 1, None);
        }
        if let Some(real) = &pads[index] {
            debug!(index, id = %real.id, "real device shadowed by virtual pad");
        }
        pads[index] = Some(project(&snapshot, index, self.timestamp_ms()));
        pads
    }
}

/// One session's handle on the device-list hook.
///
/// Dropping it removes its pad from the list if it was the active one.
pub struct PadRegistration {
    hook: Arc<GamepadHook>,
    slot: Arc<PadSlot>,
}

impl PadRegistration {
    /// Make this session the one the hook serves.
    pub fn activate(&self) {
        *self.hook.active.lock() = Some(self.slot.clone());
    }

    pub fn is_active(&self) -> bool {
        self.hook
            .active
            .lock()
            .as_ref()
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot))
    }

    pub fn publish(&self, snapshot: Option<ControllerSnapshot>) {
        *self.slot.snapshot.lock() = snapshot;
    }
}

impl Drop for PadRegistration {
    fn drop(&mut self) {
        let mut active = self.hook.active.lock();
        if active
            .as_ref()
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot))
        {
            *active = None;
        }
    }
}

/// Injects the remote snapshot by publishing it as a virtual pad.
pub struct VirtualGamepadInjector {
    registration: PadRegistration,
}

impl VirtualGamepadInjector {
    pub fn new(hook: &Arc<GamepadHook>) -> Self {
        hook.install();
        Self {
            registration: hook.register(),
        }
    }
}

impl InputInjector for VirtualGamepadInjector {
    fn strategy(&self) -> InjectionStrategy {
        InjectionStrategy::VirtualGamepad
    }

    fn activate(&mut self) {
        self.registration.activate();
    }

    fn apply(&mut self, snapshot: Option<&ControllerSnapshot>) {
        self.registration.publish(snapshot.copied());
    }

    fn release(&mut self) {
        self.registration.publish(None);
    }
}
