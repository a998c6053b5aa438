use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use peerpad_audio::{AudioHook, AudioRouter};
use peerpad_netplay::{
    GamepadHook, InjectionStrategy, InputPlatform, InputSampler, KeyboardState, NetplayConfig,
    NoGamepads, SessionCommand, SessionController, SessionEvent, TcpTransport,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod audio;
mod console;
mod headless;

use console::ConsoleCommand;
use headless::{HeadlessEmulator, PolledInput};

/// Two-player remote play over a direct TCP connection
#[derive(Parser, Debug)]
#[command(name = "peerpad")]
#[command(about = "Share one emulated game with a second player", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the emulation and wait for a guest.
    Host {
        /// Listen address published as the session id
        #[arg(short, long, default_value = "0.0.0.0:5240")]
        bind: SocketAddr,

        /// ROM to load once the session is up
        #[arg(long)]
        rom: Option<std::path::PathBuf>,

        #[command(flatten)]
        netplay: NetplayConfig,
    },
    /// Join a host as the second player.
    Join {
        /// Host session id (its listen address)
        addr: String,

        /// Redial attempts after the connection drops
        #[arg(long, default_value_t = peerpad_netplay::tcp_transport::DEFAULT_RECONNECT_ATTEMPTS)]
        reconnect_attempts: u32,

        #[command(flatten)]
        netplay: NetplayConfig,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(args.log_level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Host { bind, rom, netplay } => {
            let transport = |tx| TcpTransport::new(tx).with_bind_addr(bind);
            run(netplay, transport, SessionCommand::Create, rom).await
        }
        Command::Join {
            addr,
            reconnect_attempts,
            netplay,
        } => {
            let delay = peerpad_netplay::tcp_transport::DEFAULT_RECONNECT_DELAY;
            let transport = |tx| TcpTransport::new(tx).with_reconnect(reconnect_attempts, delay);
            run(netplay, transport, SessionCommand::Join(addr), None).await
        }
    }
}

async fn run(
    netplay: NetplayConfig,
    make_transport: impl FnOnce(mpsc::Sender<peerpad_netplay::TransportEvent>) -> TcpTransport,
    start: SessionCommand,
    rom: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let frame_interval = netplay.frame_interval();
    let strategy = netplay
        .injection
        .unwrap_or(InjectionStrategy::VirtualGamepad);

    // Process-wide surfaces, shared by every session.
    let keyboard = Arc::new(KeyboardState::new());
    let gamepads = Arc::new(GamepadHook::new(
        Arc::new(NoGamepads),
        netplay.virtual_pad_index,
    ));
    let platform = InputPlatform {
        keys: keyboard.clone(),
        gamepads: gamepads.clone(),
    };
    let audio = Arc::new(AudioRouter::new(Arc::new(AudioHook::new(
        audio::output_factory(),
    ))));

    let emulator = HeadlessEmulator::new(
        PolledInput { keyboard, gamepads },
        audio.factory(),
        strategy,
    );

    let (transport_tx, transport_rx) = mpsc::channel(256);
    let (event_tx, mut events) = mpsc::channel(256);
    let (mut controller, commands) = SessionController::new(
        netplay,
        make_transport(transport_tx),
        transport_rx,
        emulator,
        &platform,
        audio,
        event_tx,
    );
    let mut session = tokio::spawn(async move { controller.run().await });

    // Only a guest forwards local input.
    let forward_input = matches!(start, SessionCommand::Join(_));
    commands.send(start).await?;
    if let Some(path) = rom {
        commands.send(load_rom(&path).await?).await?;
    }

    let sampler = InputSampler::default();
    let mut held = peerpad_netproto::ControllerSnapshot::default();
    let mut saved: Option<Vec<u8>> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut frame = tokio::time::interval(frame_interval);

    #[cfg(feature = "gilrs")]
    let mut pad = match peerpad_netplay::GamepadSampler::new() {
        Ok(pad) => Some(pad),
        Err(e) => {
            warn!(error = %e, "no physical controller support");
            None
        }
    };

    loop {
        tokio::select! {
            result = &mut session => {
                result??;
                info!("session ended");
                return Ok(());
            }
            event = events.recv() => {
                match event {
                    Some(SessionEvent::StateSaved(state)) => {
                        info!(bytes = state.len(), "state saved");
                        saved = Some(state);
                    }
                    Some(event) => log_event(&event),
                    None => return Ok(()),
                }
            }
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let cmd = match console::parse(&line, &sampler) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        warn!("{e}");
                        continue;
                    }
                };
                let cmd = match cmd {
                    ConsoleCommand::Load(path) => match load_rom(&path).await {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            error!(path = %path.display(), error = %e, "cannot read ROM");
                            continue;
                        }
                    },
                    ConsoleCommand::Platform(id) => {
                        SessionCommand::SwitchPlatform(id.as_str().into())
                    }
                    ConsoleCommand::Volume(v) => SessionCommand::SetVolume(v),
                    ConsoleCommand::Restart => SessionCommand::Restart,
                    ConsoleCommand::Save => SessionCommand::SaveState,
                    ConsoleCommand::Restore => match saved.clone() {
                        Some(state) => SessionCommand::LoadState(state),
                        None => {
                            warn!("nothing saved yet");
                            continue;
                        }
                    },
                    ConsoleCommand::Hold(snapshot) => {
                        held = snapshot;
                        continue;
                    }
                    ConsoleCommand::Help => {
                        println!("{}", console::HELP);
                        continue;
                    }
                    ConsoleCommand::Quit => SessionCommand::Close,
                };
                commands.send(cmd).await?;
            }
            _ = frame.tick(), if forward_input => {
                #[cfg(feature = "gilrs")]
                let current = match pad.as_mut() {
                    Some(pad) => InputSampler::merge(held, pad.sample()),
                    None => held,
                };
                #[cfg(not(feature = "gilrs"))]
                let current = held;
                // The controller forwards changes only.
                let _ = commands.try_send(SessionCommand::SendInput(current));
            }
        }
    }
}

async fn load_rom(path: &std::path::Path) -> anyhow::Result<SessionCommand> {
    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SessionCommand::LoadRom {
        name,
        data: Bytes::from(data),
    })
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Ready { id } => info!(%id, "session ready, share this id"),
        SessionEvent::Connected { remote_id } => info!(%remote_id, "player 2 connected"),
        SessionEvent::PeerLeft => info!("player 2 left"),
        SessionEvent::Reconnecting => info!("reconnecting"),
        SessionEvent::RomChanged { name: Some(name) } => info!(rom = %name, "now playing"),
        SessionEvent::RomChanged { name: None } => info!("no game loaded"),
        SessionEvent::PlatformChanged(platform) => info!(%platform, "platform changed"),
        SessionEvent::FallbackState(state) => tracing::debug!(%state, "fallback frame"),
        SessionEvent::RemoteStream(stream) => info!(stream = %stream.id, "remote stream"),
        SessionEvent::LaunchFailed(reason) => error!(%reason, "launch failed"),
        SessionEvent::StateSaved(state) => info!(bytes = state.len(), "state saved"),
        SessionEvent::Notice(text) => warn!("{text}"),
        SessionEvent::Closed => info!("session closed"),
    }
}
