use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FIELD_WIDTH: i32 = 256;
pub const FIELD_HEIGHT: i32 = 240;
const MARKER_SIZE: i32 = 16;

/// Placeholder simulation the host runs while no ROM is loaded. Its state is
/// what a connected guest renders instead of a blank screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleScene {
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
    pub tick: u64,
}

impl Default for IdleScene {
    fn default() -> Self {
        Self {
            x: (FIELD_WIDTH - MARKER_SIZE) / 2,
            y: (FIELD_HEIGHT - MARKER_SIZE) / 2,
            dx: 3,
            dy: 2,
            tick: 0,
        }
    }
}

impl IdleScene {
    /// Advance one step, bouncing off the field edges.
    pub fn advance(&mut self) {
        let max_x = FIELD_WIDTH - MARKER_SIZE;
        let max_y = FIELD_HEIGHT - MARKER_SIZE;

        self.x += self.dx;
        if self.x <= 0 || self.x >= max_x {
            self.x = self.x.clamp(0, max_x);
            self.dx = -self.dx;
        }
        self.y += self.dy;
        if self.y <= 0 || self.y >= max_y {
            self.y = self.y.clamp(0, max_y);
            self.dy = -self.dy;
        }
        self.tick += 1;
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Advance and return the new state as a `StateUpdate` payload.
    pub fn step(&mut self) -> Value {
        self.advance();
        self.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_stays_inside_the_field() {
        let mut scene = IdleScene::default();
        for _ in 0..1_000 {
            scene.advance();
            assert!((0..=FIELD_WIDTH - MARKER_SIZE).contains(&scene.x));
            assert!((0..=FIELD_HEIGHT - MARKER_SIZE).contains(&scene.y));
        }
        assert_eq!(scene.tick, 1_000);
    }

    #[test]
    fn step_serializes_state() {
        let mut scene = IdleScene::default();
        let value = scene.step();
        assert_eq!(value["tick"], 1);
        let back: IdleScene = serde_json::from_value(value).unwrap();
        assert_eq!(back, scene);
    }
}
