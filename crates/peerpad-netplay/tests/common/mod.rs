#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use peerpad_audio::{
    AudioContext, AudioContextFactory, AudioError, AudioHook, AudioRouter, AudioSink,
};
use peerpad_netplay::{
    Emulator, EmulatorError, EmulatorHandle, GamepadHook, InjectionStrategy, InputPlatform,
    KeyboardState, LaunchConfig, LaunchFuture, MediaStream, NetplayConfig, NetplayError,
    NoGamepads, SessionCommand, SessionController, SessionEvent, Transport, TransportEvent,
};
use peerpad_netproto::PeerMessage;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub struct TransportLog {
    pub sent: Vec<PeerMessage>,
    pub endpoints: usize,
    pub connects: Vec<String>,
    pub calls: Vec<MediaStream>,
    pub hang_ups: usize,
    pub closes: usize,
}

/// Records every call; events are injected by the test.
#[derive(Clone, Default)]
pub struct FakeTransport {
    pub log: Arc<Mutex<TransportLog>>,
}

impl Transport for FakeTransport {
    fn create_endpoint(&mut self) -> Result<(), NetplayError> {
        self.log.lock().endpoints += 1;
        Ok(())
    }

    fn connect(&mut self, remote_id: &str) -> Result<(), NetplayError> {
        self.log.lock().connects.push(remote_id.to_string());
        Ok(())
    }

    fn send(&mut self, msg: &PeerMessage) -> Result<(), NetplayError> {
        self.log.lock().sent.push(msg.clone());
        Ok(())
    }

    fn call(&mut self, stream: &MediaStream) -> Result<(), NetplayError> {
        self.log.lock().calls.push(stream.clone());
        Ok(())
    }

    fn hang_up(&mut self) {
        self.log.lock().hang_ups += 1;
    }

    fn close(&mut self) {
        self.log.lock().closes += 1;
    }
}

#[derive(Debug, Default)]
pub struct EmulatorLog {
    pub launches: Vec<LaunchConfig>,
    pub exits: usize,
    pub restarts: usize,
    pub fail_next: bool,
    pub detached: bool,
}

pub struct FakeEmulator {
    pub log: Arc<Mutex<EmulatorLog>>,
    pub strategy: InjectionStrategy,
}

pub struct FakeHandle {
    log: Arc<Mutex<EmulatorLog>>,
}

impl EmulatorHandle for FakeHandle {
    fn exit(&mut self) {
        self.log.lock().exits += 1;
    }

    fn restart(&mut self) {
        self.log.lock().restarts += 1;
    }

    fn save_state(&mut self) -> Result<Vec<u8>, EmulatorError> {
        Ok(b"state".to_vec())
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), EmulatorError> {
        if state == b"state" {
            Ok(())
        } else {
            Err(EmulatorError::State("unknown state".into()))
        }
    }

    fn media_stream(&self) -> Option<MediaStream> {
        Some(MediaStream {
            id: "canvas".into(),
        })
    }
}

impl Emulator for FakeEmulator {
    type Handle = FakeHandle;

    fn launch(&mut self, config: LaunchConfig) -> LaunchFuture<FakeHandle> {
        let mut log = self.log.lock();
        log.launches.push(config);
        let fail = std::mem::take(&mut log.fail_next);
        let handle_log = self.log.clone();
        Box::pin(async move {
            tokio::task::yield_now().await;
            if fail {
                Err(EmulatorError::Launch("bad header".into()))
            } else {
                Ok(FakeHandle { log: handle_log })
            }
        })
    }

    fn preferred_injection(&self) -> InjectionStrategy {
        self.strategy
    }

    fn surface_attached(&self) -> bool {
        !self.log.lock().detached
    }
}

struct SilentSink;

impl AudioSink for SilentSink {
    fn write(&self, _samples: &[f32]) {}
}

struct SilentContext;

impl AudioContext for SilentContext {
    fn state(&self) -> peerpad_audio::ContextState {
        peerpad_audio::ContextState::Running
    }

    fn resume(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        8_000
    }

    fn destination(&self) -> Arc<dyn AudioSink> {
        Arc::new(SilentSink)
    }
}

pub struct SilentFactory;

impl AudioContextFactory for SilentFactory {
    fn create(&self) -> Result<Arc<dyn AudioContext>, AudioError> {
        Ok(Arc::new(SilentContext))
    }
}

/// Process-wide surfaces shared by every session in one test.
pub struct Platform {
    pub input: InputPlatform,
    pub keyboard: Arc<KeyboardState>,
    pub gamepads: Arc<GamepadHook>,
    pub audio: Arc<AudioRouter>,
}

impl Platform {
    pub fn new() -> Self {
        let keyboard = Arc::new(KeyboardState::new());
        let gamepads = Arc::new(GamepadHook::new(Arc::new(NoGamepads), 1));
        let hook = Arc::new(AudioHook::new(Arc::new(SilentFactory)));
        Self {
            input: InputPlatform {
                keys: keyboard.clone(),
                gamepads: gamepads.clone(),
            },
            keyboard,
            gamepads,
            audio: Arc::new(AudioRouter::new(hook)),
        }
    }
}

pub struct Harness {
    pub controller: SessionController<FakeTransport, FakeEmulator>,
    pub commands: mpsc::Sender<SessionCommand>,
    pub transport_tx: mpsc::Sender<TransportEvent>,
    pub events: mpsc::Receiver<SessionEvent>,
    pub transport: Arc<Mutex<TransportLog>>,
    pub emulator: Arc<Mutex<EmulatorLog>>,
}

impl Harness {
    pub fn new(platform: &Platform, strategy: InjectionStrategy) -> Self {
        let transport = FakeTransport::default();
        let transport_log = transport.log.clone();
        let emulator_log = Arc::new(Mutex::new(EmulatorLog::default()));
        let emulator = FakeEmulator {
            log: emulator_log.clone(),
            strategy,
        };
        let (transport_tx, transport_rx) = mpsc::channel(64);
        let (event_tx, events) = mpsc::channel(256);

        let (controller, commands) = SessionController::new(
            NetplayConfig::default(),
            transport,
            transport_rx,
            emulator,
            &platform.input,
            platform.audio.clone(),
            event_tx,
        );
        Self {
            controller,
            commands,
            transport_tx,
            events,
            transport: transport_log,
            emulator: emulator_log,
        }
    }

    pub async fn command(&mut self, cmd: SessionCommand) -> Result<(), NetplayError> {
        self.controller.handle_command(cmd).await
    }

    pub async fn event(&mut self, event: TransportEvent) {
        self.controller.handle_transport_event(event).await;
    }

    /// Host role, peer connected.
    pub async fn connected_host(&mut self) {
        self.command(SessionCommand::Create).await.unwrap();
        self.event(TransportEvent::Ready {
            id: "host".into(),
        })
        .await;
        self.event(TransportEvent::Open {
            remote_id: "guest".into(),
        })
        .await;
    }

    /// Guest role, connected to "host".
    pub async fn connected_guest(&mut self) {
        self.command(SessionCommand::Join("host".into()))
            .await
            .unwrap();
        self.event(TransportEvent::Ready {
            id: "guest".into(),
        })
        .await;
        self.event(TransportEvent::Open {
            remote_id: "host".into(),
        })
        .await;
    }

    pub fn take_sent(&self) -> Vec<PeerMessage> {
        std::mem::take(&mut self.transport.lock().sent)
    }

    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
