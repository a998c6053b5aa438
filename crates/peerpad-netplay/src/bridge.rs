//! Edge detection between consecutive snapshots of one player.

use peerpad_netproto::{Button, ControllerSnapshot};
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub button: Button,
    pub edge: Edge,
}

/// One event per button whose state differs, in canonical button order.
///
/// A missing `prev` is the all-released snapshot.
pub fn diff(prev: Option<&ControllerSnapshot>, cur: &ControllerSnapshot) -> Vec<EdgeEvent> {
    let prev = prev.copied().unwrap_or_default();
    Button::iter()
        .filter_map(|button| match (prev.is_pressed(button), cur.is_pressed(button)) {
            (false, true) => Some(EdgeEvent {
                button,
                edge: Edge::Pressed,
            }),
            (true, false) => Some(EdgeEvent {
                button,
                edge: Edge::Released,
            }),
            _ => None,
        })
        .collect()
}

/// Holds the previous snapshot on behalf of a caller that samples once per
/// tick.
#[derive(Debug, Default)]
pub struct InputBridge {
    previous: Option<ControllerSnapshot>,
}

impl InputBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, current: ControllerSnapshot) -> Vec<EdgeEvent> {
        let events = diff(self.previous.as_ref(), &current);
        self.previous = Some(current);
        events
    }

    pub fn previous(&self) -> Option<&ControllerSnapshot> {
        self.previous.as_ref()
    }

    /// Forget the previous snapshot. The next observation diffs against all
    /// released.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
