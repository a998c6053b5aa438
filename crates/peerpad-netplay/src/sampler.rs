//! Local input sampling.
//!
//! Player one and player two use fixed, disjoint key tables. The sampler only
//! looks at player-one identities, so synthetic player-two key events never
//! show up in the local snapshot.

use peerpad_netproto::{Button, ControllerSnapshot};

/// Identity fields a key event carries. All three always describe the same
/// physical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyIdentity {
    /// Symbolic key value.
    pub key: &'static str,
    /// Physical key code.
    pub code: &'static str,
    /// Legacy numeric key code.
    pub key_code: u32,
}

const fn id(key: &'static str, code: &'static str, key_code: u32) -> KeyIdentity {
    KeyIdentity {
        key,
        code,
        key_code,
    }
}

/// Logical button to key identity table for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMap {
    entries: [(Button, KeyIdentity); 12],
}

impl KeyMap {
    pub const fn player_one() -> Self {
        Self {
            entries: [
                (Button::Up, id("ArrowUp", "ArrowUp", 38)),
                (Button::Down, id("ArrowDown", "ArrowDown", 40)),
                (Button::Left, id("ArrowLeft", "ArrowLeft", 37)),
                (Button::Right, id("ArrowRight", "ArrowRight", 39)),
                (Button::A, id("x", "KeyX", 88)),
                (Button::B, id("z", "KeyZ", 90)),
                (Button::X, id("s", "KeyS", 83)),
                (Button::Y, id("a", "KeyA", 65)),
                (Button::L, id("q", "KeyQ", 81)),
                (Button::R, id("w", "KeyW", 87)),
                (Button::Start, id("Enter", "Enter", 13)),
                (Button::Select, id("Shift", "ShiftRight", 16)),
            ],
        }
    }

    pub const fn player_two() -> Self {
        Self {
            entries: [
                (Button::Up, id("i", "KeyI", 73)),
                (Button::Down, id("k", "KeyK", 75)),
                (Button::Left, id("j", "KeyJ", 74)),
                (Button::Right, id("l", "KeyL", 76)),
                (Button::A, id("m", "KeyM", 77)),
                (Button::B, id("n", "KeyN", 78)),
                (Button::X, id("h", "KeyH", 72)),
                (Button::Y, id("g", "KeyG", 71)),
                (Button::L, id("t", "KeyT", 84)),
                (Button::R, id("y", "KeyY", 89)),
                (Button::Start, id("p", "KeyP", 80)),
                (Button::Select, id("o", "KeyO", 79)),
            ],
        }
    }

    /// Entries are stored in [`Button`] declaration order.
    pub fn identity(&self, button: Button) -> KeyIdentity {
        self.entries[button as usize].1
    }

    /// Reverse lookup by physical code.
    pub fn button_for_code(&self, code: &str) -> Option<Button> {
        self.entries
            .iter()
            .find(|(_, identity)| identity.code == code)
            .map(|(b, _)| *b)
    }

    pub fn identities(&self) -> impl Iterator<Item = KeyIdentity> + '_ {
        self.entries.iter().map(|(_, identity)| *identity)
    }
}

/// Turns the set of held local keys into a snapshot once per tick.
#[derive(Debug, Clone)]
pub struct InputSampler {
    map: KeyMap,
}

impl Default for InputSampler {
    fn default() -> Self {
        Self::new(KeyMap::player_one())
    }
}

impl InputSampler {
    pub fn new(map: KeyMap) -> Self {
        Self { map }
    }

    pub fn key_map(&self) -> &KeyMap {
        &self.map
    }

    /// `held` are physical key codes. Codes outside the sampler's table are
    /// ignored.
    pub fn sample<'a, I>(&self, held: I) -> ControllerSnapshot
    where
        I: IntoIterator<Item = &'a str>,
    {
        ControllerSnapshot::from_pressed(
            held.into_iter()
                .filter_map(|code| self.map.button_for_code(code)),
        )
    }

    /// Combine keyboard and controller snapshots: a button is held if either
    /// source holds it.
    pub fn merge(a: ControllerSnapshot, b: ControllerSnapshot) -> ControllerSnapshot {
        ControllerSnapshot::from_pressed(a.pressed().chain(b.pressed()))
    }
}

#[cfg(feature = "gilrs")]
pub use gamepad::GamepadSampler;

#[cfg(feature = "gilrs")]
mod gamepad {
    use gilrs::{Button as GilrsButton, Event, Gilrs};
    use peerpad_netproto::{Button, ControllerSnapshot};

    use crate::error::NetplayError;

    const LAYOUT: [(GilrsButton, Button); 12] = [
        (GilrsButton::DPadUp, Button::Up),
        (GilrsButton::DPadDown, Button::Down),
        (GilrsButton::DPadLeft, Button::Left),
        (GilrsButton::DPadRight, Button::Right),
        (GilrsButton::East, Button::A),
        (GilrsButton::South, Button::B),
        (GilrsButton::North, Button::X),
        (GilrsButton::West, Button::Y),
        (GilrsButton::LeftTrigger, Button::L),
        (GilrsButton::RightTrigger, Button::R),
        (GilrsButton::Start, Button::Start),
        (GilrsButton::Select, Button::Select),
    ];

    /// Samples the first connected physical controller.
    pub struct GamepadSampler {
        gilrs: Gilrs,
    }

    impl GamepadSampler {
        pub fn new() -> Result<Self, NetplayError> {
            Gilrs::new()
                .map(|gilrs| Self { gilrs })
                .map_err(|e| NetplayError::InputDevice(e.to_string()))
        }

        /// Pump pending events, then read the current button state.
        pub fn sample(&mut self) -> ControllerSnapshot {
            while let Some(Event { .. }) = self.gilrs.next_event() {}

            let Some((_, pad)) = self.gilrs.gamepads().find(|(_, gp)| gp.is_connected()) else {
                return ControllerSnapshot::default();
            };
            ControllerSnapshot::from_pressed(
                LAYOUT
                    .iter()
                    .filter(|(g, _)| pad.is_pressed(*g))
                    .map(|(_, b)| *b),
            )
        }
    }
}
