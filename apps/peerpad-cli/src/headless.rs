//! Emulator stand-in that runs no game code. It polls player two through the
//! same path a real core would and logs what it observes.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use peerpad_audio::{AudioContext, AudioContextFactory};
use peerpad_netplay::{
    Emulator, EmulatorError, EmulatorHandle, GamepadHook, GamepadSource, InjectionStrategy,
    InputSampler, KeyMap, KeyboardState, LaunchConfig, LaunchFuture, MediaStream,
    injector::gamepad::STANDARD_LAYOUT,
};
use peerpad_netproto::{ControllerSnapshot, PlatformId};
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info};

const FRAME: Duration = Duration::from_millis(16);

/// Where the core polls player two.
#[derive(Clone)]
pub struct PolledInput {
    pub keyboard: Arc<KeyboardState>,
    pub gamepads: Arc<GamepadHook>,
}

pub struct HeadlessEmulator {
    input: PolledInput,
    audio: Arc<dyn AudioContextFactory>,
    strategy: InjectionStrategy,
}

impl HeadlessEmulator {
    pub fn new(
        input: PolledInput,
        audio: Arc<dyn AudioContextFactory>,
        strategy: InjectionStrategy,
    ) -> Self {
        Self {
            input,
            audio,
            strategy,
        }
    }
}

impl Emulator for HeadlessEmulator {
    type Handle = HeadlessHandle;

    fn launch(&mut self, config: LaunchConfig) -> LaunchFuture<HeadlessHandle> {
        let input = self.input.clone();
        let audio = self.audio.clone();
        let strategy = self.strategy;
        Box::pin(async move {
            if config.rom.is_empty() {
                return Err(EmulatorError::Launch("empty ROM image".into()));
            }
            let output = audio
                .create()
                .map_err(|e| EmulatorError::Launch(format!("audio output: {e}")))?;
            let frames = Arc::new(AtomicU64::new(0));
            let task = tokio::spawn(frame_loop(input, strategy, output, frames.clone()));
            info!(rom = %config.rom_name, platform = %config.platform, "headless core started");
            Ok(HeadlessHandle {
                rom_name: config.rom_name,
                platform: config.platform,
                frames,
                task,
            })
        })
    }

    fn preferred_injection(&self) -> InjectionStrategy {
        self.strategy
    }
}

pub struct HeadlessHandle {
    rom_name: String,
    platform: PlatformId,
    frames: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

#[derive(Serialize, Deserialize)]
struct SavedState {
    platform: PlatformId,
    rom_name: String,
    frame: u64,
}

impl EmulatorHandle for HeadlessHandle {
    fn exit(&mut self) {
        self.task.abort();
        info!(rom = %self.rom_name, "headless core stopped");
    }

    fn restart(&mut self) {
        self.frames.store(0, Ordering::Relaxed);
        info!(rom = %self.rom_name, "headless core restarted");
    }

    fn save_state(&mut self) -> Result<Vec<u8>, EmulatorError> {
        let state = SavedState {
            platform: self.platform.clone(),
            rom_name: self.rom_name.clone(),
            frame: self.frames.load(Ordering::Relaxed),
        };
        serde_json::to_vec(&state).map_err(|e| EmulatorError::State(e.to_string()))
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), EmulatorError> {
        let state: SavedState =
            serde_json::from_slice(state).map_err(|e| EmulatorError::State(e.to_string()))?;
        if state.rom_name != self.rom_name || state.platform != self.platform {
            return Err(EmulatorError::State(format!(
                "state belongs to {} on {}",
                state.rom_name, state.platform
            )));
        }
        self.frames.store(state.frame, Ordering::Relaxed);
        Ok(())
    }

    fn media_stream(&self) -> Option<MediaStream> {
        Some(MediaStream {
            id: format!("headless:{}", self.rom_name),
        })
    }
}

impl Drop for HeadlessHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read player two back out of a virtual pad entry.
fn snapshot_from_pad(source: &dyn GamepadSource, index: usize) -> ControllerSnapshot {
    let pads = source.gamepads();
    let Some(Some(pad)) = pads.get(index) else {
        return ControllerSnapshot::default();
    };
    STANDARD_LAYOUT
        .iter()
        .zip(&pad.buttons)
        .filter_map(|(slot, button)| slot.filter(|_| button.pressed))
        .fold(ControllerSnapshot::default(), |snap, b| snap.with(b, true))
}

async fn frame_loop(
    input: PolledInput,
    strategy: InjectionStrategy,
    output: Arc<dyn AudioContext>,
    frames: Arc<AtomicU64>,
) {
    let player_two = InputSampler::new(KeyMap::player_two());
    let samples_per_frame = output.sample_rate() as usize * FRAME.as_millis() as usize / 1000
        * output.channels() as usize;
    let silence = vec![0.0f32; samples_per_frame];

    let mut ticker = tokio::time::interval(FRAME);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = ControllerSnapshot::default();

    loop {
        ticker.tick().await;
        let frame = frames.fetch_add(1, Ordering::Relaxed);

        let p2 = match strategy {
            InjectionStrategy::VirtualGamepad => {
                snapshot_from_pad(input.gamepads.as_ref(), input.gamepads.reserved_index())
            }
            InjectionStrategy::SyntheticKeys => player_two.sample(input.keyboard.held_codes()),
        };
        if p2 != last {
            let held: Vec<&str> = p2.pressed().map(|b| b.name()).collect();
            info!(frame, ?held, "player 2 input");
            last = p2;
        }

        output.destination().write(&silence);
        if frame % 600 == 0 {
            debug!(frame, "headless core alive");
        }
    }
}
