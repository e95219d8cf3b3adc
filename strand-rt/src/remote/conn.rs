//! Outbound connections: dial, handshake, and sequence multiplexing.
//!
//! One outbound connection serves one peer node. Requests allocate a
//! sequence id and park on a single-use slot; the connection's reader task
//! dispatches response frames back by sequence id. On teardown every
//! pending slot is completed with a null response so askers wake up with a
//! protocol error instead of hanging.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::{oneshot, Notify};
use tokio::time::{timeout, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::wire::{Direction, Frame, FrameBody, FrameCodec};
use crate::error::ActorError;
use crate::system::config::{Network, PeerConfig};

/// Deadline for the authentication handshake.
pub(crate) const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for one request/response exchange.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Dial a TCP address under the given network flavor.
pub(crate) async fn net_connect(network: Network, addr: &str) -> Result<TcpStream, ActorError> {
    let mut last_err: Option<std::io::Error> = None;
    for candidate in lookup_host(addr).await?.filter(|a| network.admits(a)) {
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.map(ActorError::Io).unwrap_or(ActorError::ConnError))
}

struct PendingRequest {
    tx: oneshot::Sender<Option<Frame>>,
    created_at: Instant,
    canceled: AtomicBool,
}

/// Authenticated outbound connection to one peer node.
pub(crate) struct OutboundConn {
    node_id: u32,
    ready: AtomicBool,
    closed: AtomicBool,
    close_signal: Notify,
    writer: tokio::sync::Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
    pending: DashMap<u64, PendingRequest>,
    next_seq: Mutex<u64>,
}

impl OutboundConn {
    /// Dial `peer`, run the handshake, and start the reader task.
    pub(crate) async fn dial(
        local_node_id: u32,
        peer: PeerConfig,
    ) -> Result<Arc<Self>, ActorError> {
        let stream = net_connect(peer.network, &peer.address).await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, FrameCodec::new());

        let conn = Arc::new(Self {
            node_id: peer.id,
            ready: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
            writer: tokio::sync::Mutex::new(FramedWrite::new(write_half, FrameCodec::new())),
            pending: DashMap::new(),
            next_seq: Mutex::new(0),
        });

        conn.authenticate(&mut reader, local_node_id, peer.auth_token)
            .await?;
        conn.ready.store(true, Ordering::SeqCst);

        let reader_conn = Arc::clone(&conn);
        tokio::spawn(async move {
            read_loop(reader_conn, reader).await;
        });

        Ok(conn)
    }

    /// The peer node this connection reaches.
    pub(crate) fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Handshake: the auth request must be the very first frame, and only a
    /// positive auth response permits any further traffic.
    async fn authenticate(
        &self,
        reader: &mut FramedRead<OwnedReadHalf, FrameCodec>,
        local_node_id: u32,
        password: String,
    ) -> Result<(), ActorError> {
        self.write_frame(Frame::request(
            0,
            FrameBody::AuthRequest {
                from_node_id: local_node_id,
                to_node_id: self.node_id,
                password,
            },
        ))
        .await?;

        match timeout(AUTH_TIMEOUT, reader.next()).await {
            Err(_) => Err(ActorError::AuthTimeout),
            Ok(None) => Err(ActorError::ConnError),
            Ok(Some(Err(err))) => {
                warn!(node_id = self.node_id, %err, "handshake frame unreadable");
                Err(ActorError::ConnError)
            }
            Ok(Some(Ok(frame))) => match frame.body {
                FrameBody::AuthResponse { is_auth: true } => Ok(()),
                FrameBody::AuthResponse { is_auth: false } => Err(ActorError::AuthFailed),
                _ => Err(ActorError::AuthFailed),
            },
        }
    }

    /// Write one frame; frames are never interleaved on the socket.
    pub(crate) async fn write_frame(&self, frame: Frame) -> Result<(), ActorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ActorError::ConnError);
        }
        let mut writer = self.writer.lock().await;
        writer.send(frame).await
    }

    /// Issue a request and wait for its response within the request timeout.
    ///
    /// On expiry the pending entry is marked canceled and stays in the table
    /// until the late response (or teardown) retires it; the late response
    /// itself is discarded.
    pub(crate) async fn request(&self, body: FrameBody) -> Result<Frame, ActorError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(ActorError::ConnError);
        }
        let (sequence_id, rx) = self.register_pending();
        if let Err(err) = self.write_frame(Frame::request(sequence_id, body)).await {
            self.pending.remove(&sequence_id);
            return Err(err);
        }
        match timeout(REQUEST_TIMEOUT, rx).await {
            Err(_) => {
                self.cancel(sequence_id);
                Err(ActorError::RemoteTimeout)
            }
            Ok(Err(_)) | Ok(Ok(None)) => {
                Err(ActorError::RemoteResponse("connection closed".to_string()))
            }
            Ok(Ok(Some(frame))) => Ok(frame),
        }
    }

    /// Allocate a sequence id and park a reply slot under it.
    ///
    /// Ids advance monotonically, skipping zero and any id with a request
    /// still in flight.
    fn register_pending(&self) -> (u64, oneshot::Receiver<Option<Frame>>) {
        let sequence_id = {
            let mut next = self.next_seq.lock();
            loop {
                *next = next.wrapping_add(1);
                if *next != 0 && !self.pending.contains_key(&*next) {
                    break *next;
                }
            }
        };
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            sequence_id,
            PendingRequest {
                tx,
                created_at: Instant::now(),
                canceled: AtomicBool::new(false),
            },
        );
        (sequence_id, rx)
    }

    fn cancel(&self, sequence_id: u64) {
        if let Some(entry) = self.pending.get(&sequence_id) {
            entry.canceled.store(true, Ordering::SeqCst);
        }
    }

    fn dispatch(&self, frame: Frame) {
        if frame.direction != Direction::Response {
            debug!(
                node_id = self.node_id,
                sequence_id = frame.sequence_id,
                "dropping non-response frame on outbound connection"
            );
            return;
        }
        match self.pending.remove(&frame.sequence_id) {
            Some((sequence_id, entry)) => {
                if entry.canceled.load(Ordering::SeqCst) {
                    debug!(
                        node_id = self.node_id,
                        sequence_id,
                        elapsed = ?entry.created_at.elapsed(),
                        "late response for canceled request"
                    );
                }
                let _ = entry.tx.send(Some(frame));
            }
            None => {
                debug!(
                    node_id = self.node_id,
                    sequence_id = frame.sequence_id,
                    "response for unknown sequence dropped"
                );
            }
        }
    }

    /// Fail every pending request with a null response.
    fn drain_pending(&self) {
        let sequence_ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for sequence_id in sequence_ids {
            if let Some((_, entry)) = self.pending.remove(&sequence_id) {
                let _ = entry.tx.send(None);
            }
        }
    }

    /// Close the connection. Idempotent.
    pub(crate) async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.ready.store(false, Ordering::SeqCst);
        self.close_signal.notify_one();
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.get_mut().shutdown().await;
        }
        self.drain_pending();
    }
}

/// Reader task: dispatches response frames until the connection dies.
async fn read_loop(conn: Arc<OutboundConn>, mut reader: FramedRead<OwnedReadHalf, FrameCodec>) {
    loop {
        tokio::select! {
            _ = conn.close_signal.notified() => break,
            item = reader.next() => match item {
                Some(Ok(frame)) => conn.dispatch(frame),
                Some(Err(err)) => {
                    warn!(node_id = conn.node_id, %err, "outbound reader failed");
                    break;
                }
                None => {
                    debug!(node_id = conn.node_id, "peer closed outbound connection");
                    break;
                }
            },
        }
    }
    conn.ready.store(false, Ordering::SeqCst);
    conn.closed.store(true, Ordering::SeqCst);
    conn.drain_pending();
}
