//! Synthetic key event strategy.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use peerpad_netproto::ControllerSnapshot;
use tracing::trace;

use crate::{
    bridge::{Edge, InputBridge},
    config::InjectionStrategy,
    injector::InputInjector,
    sampler::{KeyIdentity, KeyMap},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub identity: KeyIdentity,
}

/// Where synthetic key events are dispatched.
pub trait KeySink: Send + Sync {
    fn dispatch(&self, event: KeyEvent);
}

/// Key-down/key-up tracking as a polling layer sees it.
#[derive(Debug, Default)]
pub struct KeyboardState {
    held: Mutex<HashSet<&'static str>>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, code: &str) -> bool {
        self.held.lock().contains(code)
    }

    /// Physical codes currently held, sorted.
    pub fn held_codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<_> = self.held.lock().iter().copied().collect();
        codes.sort_unstable();
        codes
    }
}

impl KeySink for KeyboardState {
    fn dispatch(&self, event: KeyEvent) {
        let mut held = self.held.lock();
        match event.kind {
            KeyEventKind::KeyDown => held.insert(event.identity.code),
            KeyEventKind::KeyUp => held.remove(event.identity.code),
        };
    }
}

/// Dispatches one key event per edge, using player-two identities.
pub struct SyntheticKeyInjector {
    sink: Arc<dyn KeySink>,
    map: KeyMap,
    bridge: InputBridge,
}

impl SyntheticKeyInjector {
    pub fn new(sink: Arc<dyn KeySink>) -> Self {
        Self {
            sink,
            map: KeyMap::player_two(),
            bridge: InputBridge::new(),
        }
    }

    fn emit(&self, kind: KeyEventKind, identity: KeyIdentity) {
        trace!(?kind, code = identity.code, "synthetic key event");
        self.sink.dispatch(KeyEvent { kind, identity });
    }
}

impl InputInjector for SyntheticKeyInjector {
    fn strategy(&self) -> InjectionStrategy {
        InjectionStrategy::SyntheticKeys
    }

    fn apply(&mut self, snapshot: Option<&ControllerSnapshot>) {
        let Some(snapshot) = snapshot else {
            self.release();
            return;
        };
        for event in self.bridge.observe(*snapshot) {
            let kind = match event.edge {
                Edge::Pressed => KeyEventKind::KeyDown,
                Edge::Released => KeyEventKind::KeyUp,
            };
            self.emit(kind, self.map.identity(event.button));
        }
    }

    /// Key-up for everything still held, then forget the last snapshot.
    fn release(&mut self) {
        let held: Vec<_> = self
            .bridge
            .previous()
            .map(|prev| prev.pressed().collect())
            .unwrap_or_default();
        for button in held {
            self.emit(KeyEventKind::KeyUp, self.map.identity(button));
        }
        self.bridge.reset();
    }
}

#[cfg(test)]
mod tests {

    use peerpad_netproto::Button;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<KeyEvent>>,
    }

    impl KeySink for Recorder {
        fn dispatch(&self, event: KeyEvent) {
            self.events.lock().push(event);
        }
    }

    #[test]
    fn one_event_per_edge_with_player_two_identity() {
        let recorder = Arc::new(Recorder::default());
        let mut injector = SyntheticKeyInjector::new(recorder.clone());

        let held = ControllerSnapshot::from_pressed([Button::A]);
        injector.apply(Some(&held));
        injector.apply(Some(&held));
        injector.apply(Some(&ControllerSnapshot::default()));

        let events = recorder.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, KeyEventKind::KeyDown);
        assert_eq!(events[0].identity, KeyMap::player_two().identity(Button::A));
        assert_eq!(events[1].kind, KeyEventKind::KeyUp);
    }

    #[test]
    fn release_lifts_held_keys_once() {
        let keyboard = Arc::new(KeyboardState::new());
        let mut injector = SyntheticKeyInjector::new(keyboard.clone());
        injector.apply(Some(&ControllerSnapshot::from_pressed([Button::Up, Button::B])));
        assert_eq!(keyboard.held_codes(), vec!["KeyI", "KeyN"]);

        injector.apply(None);
        assert!(keyboard.held_codes().is_empty());

        // Next snapshot diffs against released, not the stale one.
        injector.apply(Some(&ControllerSnapshot::from_pressed([Button::B])));
        assert_eq!(keyboard.held_codes(), vec!["KeyN"]);
    }
}
