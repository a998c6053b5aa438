//! Normalized controller state shared by both peers.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Logical buttons of the shared controller layout.
///
/// Iteration order is the canonical order used when diffing snapshots.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    X,
    Y,
    L,
    R,
    Start,
    Select,
}

impl Button {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// One sampling tick's complete button state.
///
/// Missing fields on the wire decode as `false`; a snapshot never has an
/// "unknown" button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSnapshot {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub l: bool,
    pub r: bool,
    pub start: bool,
    pub select: bool,
}

impl ControllerSnapshot {
    /// Builds a snapshot with exactly the given buttons held.
    pub fn from_pressed<I: IntoIterator<Item = Button>>(buttons: I) -> Self {
        buttons
            .into_iter()
            .fold(Self::default(), |snap, button| snap.with(button, true))
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        match button {
            Button::Up => self.up,
            Button::Down => self.down,
            Button::Left => self.left,
            Button::Right => self.right,
            Button::A => self.a,
            Button::B => self.b,
            Button::X => self.x,
            Button::Y => self.y,
            Button::L => self.l,
            Button::R => self.r,
            Button::Start => self.start,
            Button::Select => self.select,
        }
    }

    /// Returns a copy with `button` set to `pressed`.
    #[must_use]
    pub fn with(mut self, button: Button, pressed: bool) -> Self {
        let slot = match button {
            Button::Up => &mut self.up,
            Button::Down => &mut self.down,
            Button::Left => &mut self.left,
            Button::Right => &mut self.right,
            Button::A => &mut self.a,
            Button::B => &mut self.b,
            Button::X => &mut self.x,
            Button::Y => &mut self.y,
            Button::L => &mut self.l,
            Button::R => &mut self.r,
            Button::Start => &mut self.start,
            Button::Select => &mut self.select,
        };
        *slot = pressed;
        self
    }

    /// Held buttons in canonical order.
    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        Button::iter().filter(|b| self.is_pressed(*b))
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}
