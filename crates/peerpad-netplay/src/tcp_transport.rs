//! Transport adapter over plain TCP.
//!
//! The host listens and serves one peer at a time; the guest dials the
//! host's address and redials on loss. Endpoint ids are socket addresses.
//! Messages are sent as length-prefixed frames.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use peerpad_netproto::{PeerMessage, ProtoError, codec::FrameDecoder, codec::encode_frame};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, error, info, trace, warn};

use crate::{
    error::NetplayError,
    transport::{MediaStream, Transport, TransportErrorKind, TransportEvent},
};

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);

type Outbound = Arc<Mutex<Option<mpsc::UnboundedSender<Bytes>>>>;

pub struct TcpTransport {
    event_tx: mpsc::Sender<TransportEvent>,
    bind_addr: SocketAddr,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    outbound: Outbound,
    task: Option<JoinHandle<()>>,
}

impl TcpTransport {
    /// Listens on an ephemeral loopback port unless configured otherwise.
    pub fn new(event_tx: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            event_tx,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            outbound: Arc::new(Mutex::new(None)),
            task: None,
        }
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_reconnect(mut self, attempts: u32, delay: Duration) -> Self {
        self.reconnect_attempts = attempts;
        self.reconnect_delay = delay;
        self
    }

    fn replace_task(&mut self, task: JoinHandle<()>) {
        if let Some(old) = self.task.replace(task) {
            old.abort();
        }
    }
}

impl Transport for TcpTransport {
    fn create_endpoint(&mut self) -> Result<(), NetplayError> {
        let task = tokio::spawn(listen_task(
            self.bind_addr,
            self.event_tx.clone(),
            self.outbound.clone(),
        ));
        self.replace_task(task);
        Ok(())
    }

    fn connect(&mut self, remote_id: &str) -> Result<(), NetplayError> {
        let addr: SocketAddr = remote_id.parse().map_err(|_| {
            warn!(remote_id, "remote id is not a socket address");
            NetplayError::PeerUnavailable
        })?;
        let task = tokio::spawn(dial_task(
            addr,
            self.reconnect_attempts,
            self.reconnect_delay,
            self.event_tx.clone(),
            self.outbound.clone(),
        ));
        self.replace_task(task);
        Ok(())
    }

    fn send(&mut self, msg: &PeerMessage) -> Result<(), NetplayError> {
        let frame = encode_frame(msg)?;
        let outbound = self.outbound.lock();
        let tx = outbound.as_ref().ok_or(NetplayError::NotConnected)?;
        trace!(kind = %msg.kind(), len = frame.len(), "queue frame");
        tx.send(frame).map_err(|_| NetplayError::ChannelSend)
    }

    fn call(&mut self, stream: &MediaStream) -> Result<(), NetplayError> {
        // The TCP adapter has no media channel.
        debug!(stream = %stream.id, "media relay not carried over tcp");
        Ok(())
    }

    fn hang_up(&mut self) {}

    fn close(&mut self) {
        self.outbound.lock().take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn listen_task(bind: SocketAddr, event_tx: mpsc::Sender<TransportEvent>, outbound: Outbound) {
    let listener = match TcpListener::bind(bind).await {
        Ok(l) => l,
        Err(e) => {
            error!(%bind, error = %e, "failed to bind listener");
            let _ = event_tx
                .send(TransportEvent::Error(TransportErrorKind::IdUnavailable))
                .await;
            return;
        }
    };
    let local = match listener.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "listener has no local address");
            let _ = event_tx
                .send(TransportEvent::Error(TransportErrorKind::IdUnavailable))
                .await;
            return;
        }
    };
    info!(%local, "listening for a peer");
    if event_tx
        .send(TransportEvent::Ready {
            id: local.to_string(),
        })
        .await
        .is_err()
    {
        return;
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "accept failed");
                let _ = event_tx
                    .send(TransportEvent::Error(TransportErrorKind::SocketError))
                    .await;
                continue;
            }
        };
        info!(%peer, "peer connected");
        run_connection(stream, peer.to_string(), &event_tx, &outbound).await;
        if event_tx.send(TransportEvent::Close).await.is_err() {
            return;
        }
    }
}

async fn dial_task(
    addr: SocketAddr,
    attempts: u32,
    delay: Duration,
    event_tx: mpsc::Sender<TransportEvent>,
    outbound: Outbound,
) {
    let mut ready_sent = false;
    let mut failures = 0u32;

    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                failures = 0;
                if !ready_sent {
                    let id = stream
                        .local_addr()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|_| "guest".to_string());
                    if event_tx.send(TransportEvent::Ready { id }).await.is_err() {
                        return;
                    }
                    ready_sent = true;
                }
                run_connection(stream, addr.to_string(), &event_tx, &outbound).await;

                let recoverable = attempts > 0;
                if event_tx
                    .send(TransportEvent::Disconnected { recoverable })
                    .await
                    .is_err()
                    || !recoverable
                {
                    return;
                }
            }
            Err(e) => {
                failures += 1;
                debug!(%addr, failures, error = %e, "dial failed");
                if failures > attempts {
                    let event = if ready_sent {
                        TransportEvent::Disconnected { recoverable: false }
                    } else {
                        TransportEvent::Error(TransportErrorKind::PeerUnavailable)
                    };
                    let _ = event_tx.send(event).await;
                    return;
                }
            }
        }
        tokio::time::sleep(delay).await;
    }
}

/// Pump one connection until it closes. Installs the outbound sender for the
/// connection's lifetime.
async fn run_connection(
    stream: TcpStream,
    remote_id: String,
    event_tx: &mpsc::Sender<TransportEvent>,
    outbound: &Outbound,
) {
    let _ = stream.set_nodelay(true);
    let (mut read, mut write) = stream.into_split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    *outbound.lock() = Some(tx);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = write.write_all(&frame).await {
                warn!(error = %e, "write failed");
                break;
            }
        }
        let _ = write.shutdown().await;
    });

    if event_tx
        .send(TransportEvent::Open {
            remote_id: remote_id.clone(),
        })
        .await
        .is_ok()
    {
        read_loop(&mut read, event_tx).await;
    }

    outbound.lock().take();
    writer.abort();
    debug!(%remote_id, "connection closed");
}

async fn read_loop(read: &mut (impl AsyncRead + Unpin), event_tx: &mpsc::Sender<TransportEvent>) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 8 * 1024];

    loop {
        let n = match read.read(&mut buf).await {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "read failed");
                return;
            }
        };
        decoder.push(&buf[..n]);

        loop {
            match decoder.next_message() {
                Ok(Some(msg)) => {
                    if event_tx.send(TransportEvent::Data(msg)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(ProtoError::Json(e)) => {
                    warn!(error = %e, "dropping undecodable message");
                }
                Err(e) => {
                    error!(error = %e, "framing error, dropping connection");
                    return;
                }
            }
        }
    }
}
