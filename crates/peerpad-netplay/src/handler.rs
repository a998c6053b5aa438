//! Session controller: drives one peer session.
//!
//! This module handles:
//! - Host/guest lifecycle around the transport's open/close/error events
//! - Protocol message dispatch
//! - ROM launch and platform switches on the host, with overlap rejection
//! - Per-frame remote input injection and the idle fallback stream

use std::sync::Arc;

use bytes::Bytes;
use peerpad_audio::{AudioRouter, Tone};
use peerpad_netproto::{ControllerSnapshot, PeerMessage, PlatformId};
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use crate::{
    bridge::InputBridge,
    config::{InjectionStrategy, NetplayConfig},
    emulator::{Emulator, EmulatorError, EmulatorHandle, LaunchConfig, LaunchFuture},
    error::NetplayError,
    idle::IdleScene,
    injector::{InputInjector, InputPlatform, build_injector},
    remote::LatestInput,
    session::{PeerSession, SessionRole, SessionState},
    transport::{MediaStream, Transport, TransportEvent},
};

const CONNECT_CHIME_HZ: f32 = 660.0;
const LEAVE_CHIME_HZ: f32 = 440.0;

#[derive(Debug)]
pub enum SessionCommand {
    /// Become the host and wait for a guest.
    Create,
    /// Become the guest of `remote_id`.
    Join(String),
    LoadRom {
        name: String,
        data: Bytes,
    },
    SwitchPlatform(PlatformId),
    SetVolume(f32),
    /// Guest: the local player's snapshot for this tick.
    SendInput(ControllerSnapshot),
    Restart,
    SaveState,
    LoadState(Vec<u8>),
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Local endpoint id, ready to publish.
    Ready {
        id: String,
    },
    Connected {
        remote_id: String,
    },
    /// The second player left. Emulation keeps running.
    PeerLeft,
    /// The transport is re-establishing the connection by itself.
    Reconnecting,
    /// Loaded game changed. `None` means nothing is loaded.
    RomChanged {
        name: Option<String>,
    },
    PlatformChanged(PlatformId),
    /// Placeholder state to render while no game is running.
    FallbackState(Value),
    RemoteStream(MediaStream),
    LaunchFailed(String),
    StateSaved(Vec<u8>),
    /// Transient notification for the user.
    Notice(String),
    Closed,
}

struct PendingLaunch<H> {
    rom_name: String,
    future: LaunchFuture<H>,
}

async fn poll_launch<H>(pending: &mut Option<PendingLaunch<H>>) -> Result<H, EmulatorError> {
    match pending {
        Some(launch) => (&mut launch.future).await,
        None => std::future::pending().await,
    }
}

/// Owns one peer session and everything it drives.
pub struct SessionController<T: Transport, E: Emulator> {
    session: PeerSession,
    config: NetplayConfig,
    transport: T,
    transport_rx: mpsc::Receiver<TransportEvent>,
    command_rx: mpsc::Receiver<SessionCommand>,
    event_tx: mpsc::Sender<SessionEvent>,
    emulator: E,
    running: Option<E::Handle>,
    pending_launch: Option<PendingLaunch<E::Handle>>,
    injector: Box<dyn InputInjector>,
    remote_input: Arc<LatestInput>,
    /// Guest: edge detection on outgoing input.
    bridge: InputBridge,
    audio: Arc<AudioRouter>,
    idle: IdleScene,
    platform_tx: watch::Sender<PlatformId>,
    relaying: bool,
}

impl<T: Transport, E: Emulator> SessionController<T, E> {
    pub fn new(
        config: NetplayConfig,
        transport: T,
        transport_rx: mpsc::Receiver<TransportEvent>,
        emulator: E,
        platform: &InputPlatform,
        audio: Arc<AudioRouter>,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> (Self, mpsc::Sender<SessionCommand>) {
        let (tx, rx) = mpsc::channel(32);

        let strategy = config
            .injection
            .unwrap_or_else(|| emulator.preferred_injection());
        info!(?strategy, "remote input injection selected");
        let injector = build_injector(strategy, platform);

        let initial_platform = config.platform_id();
        let (platform_tx, _) = watch::channel(initial_platform.clone());

        (
            Self {
                session: PeerSession::new(initial_platform),
                config,
                transport,
                transport_rx,
                command_rx: rx,
                event_tx,
                emulator,
                running: None,
                pending_launch: None,
                injector,
                remote_input: Arc::new(LatestInput::new()),
                bridge: InputBridge::new(),
                audio,
                idle: IdleScene::default(),
                platform_tx,
                relaying: false,
            },
            tx,
        )
    }

    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    pub fn remote_input(&self) -> &Arc<LatestInput> {
        &self.remote_input
    }

    pub fn injection_strategy(&self) -> InjectionStrategy {
        self.injector.strategy()
    }

    /// Observe committed platform changes.
    pub fn platform_watch(&self) -> watch::Receiver<PlatformId> {
        self.platform_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn is_launching(&self) -> bool {
        self.pending_launch.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn emulator(&self) -> &E {
        &self.emulator
    }

    /// Run the controller until the session closes.
    pub async fn run(&mut self) -> Result<(), NetplayError> {
        let mut frame = tokio::time::interval(self.config.frame_interval());
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut idle = tokio::time::interval(self.config.idle_sync_interval());
        idle.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // Transport events first so input is applied on the next frame.
            tokio::select! {
                biased;

                event = self.transport_rx.recv() => {
                    match event {
                        Some(event) => self.handle_transport_event(event).await,
                        None => {
                            debug!("transport event channel closed");
                            self.close().await;
                        }
                    }
                }
                result = poll_launch(&mut self.pending_launch), if self.pending_launch.is_some() => {
                    if let Err(e) = self.finish_launch(result).await {
                        warn!(error = %e, "launch did not complete");
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Close) | None => self.close().await,
                        Some(cmd) => {
                            if let Err(e) = self.handle_command(cmd).await {
                                self.report(e).await;
                            }
                        }
                    }
                }
                _ = frame.tick() => {
                    self.on_frame();
                }
                _ = idle.tick() => {
                    self.on_idle_tick().await;
                }
            }

            if self.session.is_closed() {
                return Ok(());
            }
        }
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.session.is_closed() {
            debug!(?event, "ignoring transport event after close");
            return;
        }
        let result = match event {
            TransportEvent::Ready { id } => {
                self.on_ready(id).await;
                Ok(())
            }
            TransportEvent::Open { remote_id } => self.handle_peer_open(remote_id).await,
            TransportEvent::Data(msg) => self.handle_message(msg).await,
            TransportEvent::Close => self.handle_peer_lost(false).await,
            TransportEvent::Disconnected { recoverable: true } => {
                self.handle_peer_lost(true).await
            }
            TransportEvent::Disconnected { recoverable: false } => {
                warn!("transport lost the connection for good");
                self.emit(SessionEvent::Notice("connection lost".into()))
                    .await;
                self.close().await;
                Ok(())
            }
            TransportEvent::Error(kind) => {
                self.handle_transport_error(kind.classify()).await;
                Ok(())
            }
            TransportEvent::Stream(stream) => {
                self.handle_remote_stream(stream).await;
                Ok(())
            }
        };
        if let Err(e) = result {
            self.report(e).await;
        }
    }

    async fn on_ready(&mut self, id: String) {
        if self.session.on_ready(&id) {
            info!(%id, role = ?self.session.role(), "endpoint ready");
            self.emit(SessionEvent::Ready { id }).await;
        } else {
            debug!(%id, "endpoint re-announced, keeping original id");
        }
    }

    async fn handle_peer_open(&mut self, remote_id: String) -> Result<(), NetplayError> {
        if !self.session.on_open(&remote_id)? {
            debug!(%remote_id, "duplicate open ignored");
            return Ok(());
        }
        info!(%remote_id, role = ?self.session.role(), "peer connected");

        // Only the host injects; a guest must not claim the shared surfaces.
        if self.session.role() == SessionRole::Host {
            self.injector.activate();
        }
        self.bridge.reset();
        self.emit(SessionEvent::Connected {
            remote_id: remote_id.clone(),
        })
        .await;
        self.chime(CONNECT_CHIME_HZ);

        if self.session.role() == SessionRole::Host {
            // Bring a late-joining guest to parity.
            self.send(PeerMessage::PlatformChange(self.session.platform.clone()))?;
            if let Some(name) = self.session.rom_name.clone() {
                self.send(PeerMessage::rom_load(name))?;
                self.start_relay()?;
            }
        }
        Ok(())
    }

    async fn handle_message(&mut self, msg: PeerMessage) -> Result<(), NetplayError> {
        let role = self.session.role();
        match msg {
            PeerMessage::Input(snapshot) => {
                if role != SessionRole::Host {
                    debug!(?role, "ignoring INPUT outside the host role");
                    return Ok(());
                }
                self.remote_input.store(snapshot);
            }
            PeerMessage::StateUpdate(state) => {
                if role != SessionRole::Guest || self.session.remote_running {
                    debug!(?role, "ignoring STATE_UPDATE");
                    return Ok(());
                }
                self.session.fallback_state = Some(state.clone());
                self.emit(SessionEvent::FallbackState(state)).await;
            }
            PeerMessage::PlatformChange(platform) => {
                info!(%platform, "peer switched platform");
                self.apply_platform(platform, false).await?;
            }
            PeerMessage::RomLoad(rom) => {
                if role != SessionRole::Guest {
                    debug!(?role, "ignoring ROM_LOAD outside the guest role");
                    return Ok(());
                }
                info!(rom = %rom.name, "host is running a new game");
                self.session.rom_name = Some(rom.name.clone());
                self.session.remote_running = true;
                self.emit(SessionEvent::RomChanged {
                    name: Some(rom.name),
                })
                .await;
            }
        }
        Ok(())
    }

    /// Peer channel closed or the signaling link dropped. The running program
    /// is left alone.
    async fn handle_peer_lost(&mut self, recoverable: bool) -> Result<(), NetplayError> {
        let was_connected = self.session.peer_connected;
        self.session.on_peer_lost()?;
        self.remote_input.clear();
        self.injector.release();
        self.stop_relay();

        if was_connected {
            info!(recoverable, "second player disconnected");
            self.emit(SessionEvent::PeerLeft).await;
            self.chime(LEAVE_CHIME_HZ);
        }
        if recoverable {
            self.emit(SessionEvent::Reconnecting).await;
        }
        Ok(())
    }

    async fn handle_transport_error(&mut self, err: NetplayError) {
        match err {
            NetplayError::TransientTransport(_) => {
                warn!(error = %err, "transient transport error");
            }
            NetplayError::UnknownConnection(_) => {
                error!(error = %err, "connection attempt failed");
                let aborted = self.session.state() == SessionState::Connecting;
                self.report(err).await;
                if aborted {
                    self.close().await;
                }
            }
            err => self.report(err).await,
        }
    }

    async fn handle_remote_stream(&mut self, stream: MediaStream) {
        if self.session.role() != SessionRole::Guest {
            debug!(stream = %stream.id, "ignoring media stream outside the guest role");
            return;
        }
        info!(stream = %stream.id, "receiving remote media");
        self.session.remote_running = true;
        self.emit(SessionEvent::RemoteStream(stream)).await;
    }

    pub async fn handle_command(&mut self, cmd: SessionCommand) -> Result<(), NetplayError> {
        if self.session.is_closed() {
            return Err(NetplayError::Closed);
        }
        match cmd {
            SessionCommand::Create => {
                self.session.create()?;
                self.transport.create_endpoint()
            }
            SessionCommand::Join(remote_id) => {
                self.session.join(&remote_id)?;
                self.transport.connect(&remote_id)
            }
            SessionCommand::LoadRom { name, data } => self.load_rom(name, data).await,
            SessionCommand::SwitchPlatform(platform) => self.apply_platform(platform, true).await,
            SessionCommand::SetVolume(volume) => {
                let applied = self.audio.set_volume(volume);
                debug!(requested = volume, applied, "volume changed");
                Ok(())
            }
            SessionCommand::SendInput(snapshot) => self.send_input(snapshot),
            SessionCommand::Restart => {
                self.running_mut()?.restart();
                Ok(())
            }
            SessionCommand::SaveState => {
                let state = self.running_mut()?.save_state()?;
                self.emit(SessionEvent::StateSaved(state)).await;
                Ok(())
            }
            SessionCommand::LoadState(state) => {
                self.running_mut()?.load_state(&state)?;
                Ok(())
            }
            SessionCommand::Close => {
                self.close().await;
                Ok(())
            }
        }
    }

    fn running_mut(&mut self) -> Result<&mut E::Handle, NetplayError> {
        self.running.as_mut().ok_or(NetplayError::NoProgram)
    }

    fn send_input(&mut self, snapshot: ControllerSnapshot) -> Result<(), NetplayError> {
        let role = self.session.role();
        if role != SessionRole::Guest {
            return Err(NetplayError::InvalidRole {
                action: "send input",
                role,
            });
        }
        if self.bridge.observe(snapshot).is_empty() {
            return Ok(());
        }
        match self.send(PeerMessage::Input(snapshot)) {
            Err(NetplayError::NotConnected) => Ok(()),
            other => other,
        }
    }

    /// Start a launch. The result is collected by [`Self::settle`] or the run
    /// loop.
    async fn load_rom(&mut self, name: String, data: Bytes) -> Result<(), NetplayError> {
        let role = self.session.role();
        if role == SessionRole::Guest {
            return Err(NetplayError::InvalidRole {
                action: "load ROM",
                role,
            });
        }
        if let Some(pending) = &self.pending_launch {
            warn!(pending = %pending.rom_name, requested = %name, "launch already in flight");
            return Err(NetplayError::Busy("ROM load"));
        }
        if !self.emulator.surface_attached() {
            error!(rom = %name, "rendering surface is detached");
            self.rollback_to_idle().await;
            return Err(NetplayError::DeviceDetached);
        }

        self.teardown_program();
        let platform = self.committed_platform().await?;
        info!(rom = %name, %platform, size = data.len(), "launching");
        let future = self.emulator.launch(LaunchConfig {
            platform,
            rom_name: name.clone(),
            rom: data,
        });
        self.pending_launch = Some(PendingLaunch {
            rom_name: name,
            future,
        });
        Ok(())
    }

    /// Resolves once the session's platform is the committed one.
    async fn committed_platform(&mut self) -> Result<PlatformId, NetplayError> {
        let target = self.session.platform.clone();
        let mut rx = self.platform_tx.subscribe();
        let committed = rx
            .wait_for(|p| *p == target)
            .await
            .map_err(|_| NetplayError::Closed)?;
        Ok(committed.clone())
    }

    /// Wait for an in-flight launch and apply its outcome.
    pub async fn settle(&mut self) -> Result<(), NetplayError> {
        if self.pending_launch.is_none() {
            return Ok(());
        }
        let result = poll_launch(&mut self.pending_launch).await;
        self.finish_launch(result).await
    }

    async fn finish_launch(
        &mut self,
        result: Result<E::Handle, EmulatorError>,
    ) -> Result<(), NetplayError> {
        let Some(pending) = self.pending_launch.take() else {
            return Ok(());
        };
        let name = pending.rom_name;

        match result {
            Ok(mut handle) => {
                if self.session.is_closed() {
                    handle.exit();
                    return Err(NetplayError::Closed);
                }
                info!(rom = %name, "program running");
                self.running = Some(handle);
                self.session.rom_name = Some(name.clone());
                if self.session.role() == SessionRole::Host && self.session.is_connected() {
                    if let Err(e) = self.send(PeerMessage::rom_load(name.clone())) {
                        warn!(error = %e, "ROM_LOAD not delivered");
                    }
                    if let Err(e) = self.start_relay() {
                        warn!(error = %e, "media relay not started");
                    }
                }
                self.emit(SessionEvent::RomChanged { name: Some(name) })
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(rom = %name, error = %e, "launch failed");
                self.rollback_to_idle().await;
                let err = NetplayError::from(e);
                self.emit(SessionEvent::LaunchFailed(err.to_string())).await;
                Err(err)
            }
        }
    }

    /// Back to "no program loaded" with the fallback screen showing.
    async fn rollback_to_idle(&mut self) {
        self.teardown_program();
        self.session.rom_name = None;
        self.idle = IdleScene::default();
        self.emit(SessionEvent::RomChanged { name: None }).await;
        self.emit(SessionEvent::FallbackState(self.idle.to_value()))
            .await;

        // Resets the guest's loaded-game indicator so it takes idle state again.
        if self.session.role() == SessionRole::Host && self.session.is_connected() {
            let platform = self.session.platform.clone();
            if let Err(e) = self.send(PeerMessage::PlatformChange(platform)) {
                warn!(error = %e, "PLATFORM_CHANGE not delivered after rollback");
            }
        }
    }

    fn teardown_program(&mut self) {
        self.stop_relay();
        if let Some(mut handle) = self.running.take() {
            debug!("exiting running program");
            handle.exit();
        }
    }

    async fn apply_platform(
        &mut self,
        platform: PlatformId,
        announce: bool,
    ) -> Result<(), NetplayError> {
        if self.pending_launch.is_some() {
            return Err(NetplayError::Busy("platform switch"));
        }

        self.teardown_program();
        self.remote_input.clear();
        self.injector.release();
        self.session.rom_name = None;
        self.session.remote_running = false;
        self.session.platform = platform.clone();
        self.platform_tx.send_replace(platform.clone());
        info!(%platform, "platform committed");

        self.emit(SessionEvent::PlatformChanged(platform.clone()))
            .await;
        self.emit(SessionEvent::RomChanged { name: None }).await;

        if announce && self.session.is_connected() {
            self.send(PeerMessage::PlatformChange(platform))?;
        }
        Ok(())
    }

    /// One display tick. Returns false once the session is closed.
    pub fn on_frame(&mut self) -> bool {
        if self.session.is_closed() {
            return false;
        }
        if self.session.role() == SessionRole::Host {
            let latest = self.remote_input.current();
            self.injector.apply(latest.as_ref());
        }
        true
    }

    /// Host with no game loaded: push placeholder state to a connected guest.
    pub async fn on_idle_tick(&mut self) {
        if self.session.role() != SessionRole::Host
            || !self.session.is_connected()
            || self.session.has_rom()
            || self.pending_launch.is_some()
        {
            return;
        }
        let state = self.idle.step();
        if let Err(e) = self.send(PeerMessage::StateUpdate(state)) {
            debug!(error = %e, "idle state not sent");
        }
    }

    fn start_relay(&mut self) -> Result<(), NetplayError> {
        if self.relaying {
            return Ok(());
        }
        let Some(stream) = self.running.as_ref().and_then(|h| h.media_stream()) else {
            debug!("running program exposes no media stream");
            return Ok(());
        };
        self.transport.call(&stream)?;
        self.relaying = true;
        debug!(stream = %stream.id, "media relay started");
        Ok(())
    }

    fn stop_relay(&mut self) {
        if self.relaying {
            self.transport.hang_up();
            self.relaying = false;
            debug!("media relay stopped");
        }
    }

    fn send(&mut self, msg: PeerMessage) -> Result<(), NetplayError> {
        if !self.session.is_connected() {
            return Err(NetplayError::NotConnected);
        }
        debug!(kind = %msg.kind(), "send");
        self.transport.send(&msg)
    }

    fn chime(&self, frequency_hz: f32) {
        if let Err(e) = self.audio.play_tone(&Tone::chime(frequency_hz)) {
            debug!(error = %e, "ui tone not played");
        }
    }

    async fn report(&mut self, err: NetplayError) {
        if err.is_user_visible() {
            warn!(error = %err, "session error");
            self.emit(SessionEvent::Notice(err.to_string())).await;
        } else {
            debug!(error = %err, "session error");
        }
    }

    async fn emit(&mut self, event: SessionEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("session event receiver dropped");
        }
    }

    /// Release everything the session holds. Returns false if already closed.
    fn shutdown(&mut self) -> bool {
        if !self.session.close() {
            return false;
        }
        self.stop_relay();
        self.remote_input.clear();
        self.injector.release();
        if self.pending_launch.take().is_some() {
            debug!("dropping in-flight launch");
        }
        if let Some(mut handle) = self.running.take() {
            handle.exit();
        }
        self.transport.close();
        true
    }

    /// Tear the session down. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.shutdown() {
            info!("session closed");
            self.emit(SessionEvent::Closed).await;
        }
    }
}

impl<T: Transport, E: Emulator> Drop for SessionController<T, E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
