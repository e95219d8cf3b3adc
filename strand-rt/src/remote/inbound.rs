//! Inbound connections: handshake enforcement and request dispatch.
//!
//! Every accepted socket must open with a valid auth request; anything else
//! closes the connection. Authenticated requests are queued on a bounded
//! channel and dispatched concurrently by the worker; each response reuses
//! the request's sequence id with direction Response.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::conn::AUTH_TIMEOUT;
use super::wire::{Direction, Frame, FrameBody, FrameCodec};
use crate::error::ActorError;
use crate::reference::Ref;
use crate::registry::LocalRegistry;
use crate::remote::reference::RemoteRef;
use crate::util::Id;

/// Capacity of the inbound request queue.
pub(crate) const INBOUND_QUEUE_LENGTH: usize = 10;

/// Authenticated inbound connection from one peer node.
pub(crate) struct InboundConn {
    node_id: u32,
    writer: tokio::sync::Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl InboundConn {
    /// Write a response frame back to the peer.
    async fn reply(&self, sequence_id: u64, body: FrameBody) -> Result<(), ActorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ActorError::ReplyFailed);
        }
        let mut writer = self.writer.lock().await;
        writer
            .send(Frame::response(sequence_id, body))
            .await
            .map_err(|_| ActorError::ReplyFailed)
    }

    /// Close the connection. Idempotent.
    pub(crate) async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.close_signal.notify_one();
        let mut writer = self.writer.lock().await;
        let _ = writer.get_mut().shutdown().await;
    }
}

/// One authenticated request awaiting dispatch.
pub(crate) struct InboundRequest {
    pub(crate) frame: Frame,
    pub(crate) conn: Arc<InboundConn>,
}

/// Everything a per-connection task needs from the manager.
#[derive(Clone)]
pub(crate) struct InboundContext {
    pub(crate) node_id: u32,
    pub(crate) auth_token: String,
    pub(crate) conns: Arc<Mutex<HashMap<u32, Arc<InboundConn>>>>,
    pub(crate) queue: mpsc::Sender<InboundRequest>,
}

/// Serve one accepted socket: enforce the handshake, then feed the queue.
pub(crate) async fn handle_connection(stream: TcpStream, ctx: InboundContext) {
    let peer = stream.peer_addr().ok();
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, FrameCodec::new());
    let writer = FramedWrite::new(write_half, FrameCodec::new());

    // First frame: an auth request, within the handshake deadline.
    let first = match timeout(AUTH_TIMEOUT, reader.next()).await {
        Err(_) => {
            debug!(?peer, "handshake timed out");
            return;
        }
        Ok(None) | Ok(Some(Err(_))) => {
            debug!(?peer, "connection died during handshake");
            return;
        }
        Ok(Some(Ok(frame))) => frame,
    };

    let sequence_id = first.sequence_id;
    let refuse = |mut writer: FramedWrite<OwnedWriteHalf, FrameCodec>| async move {
        let _ = writer
            .send(Frame::response(
                sequence_id,
                FrameBody::AuthResponse { is_auth: false },
            ))
            .await;
        let _ = writer.get_mut().shutdown().await;
    };

    let (from_node_id, to_node_id, password) = match first.body {
        FrameBody::AuthRequest {
            from_node_id,
            to_node_id,
            password,
        } => (from_node_id, to_node_id, password),
        other => {
            warn!(?peer, kind = ?other.kind(), "first frame was not an auth request");
            refuse(writer).await;
            return;
        }
    };

    if password != ctx.auth_token || from_node_id == 0 || to_node_id != ctx.node_id {
        warn!(?peer, from_node_id, to_node_id, "authentication refused");
        refuse(writer).await;
        return;
    }

    let conn = Arc::new(InboundConn {
        node_id: from_node_id,
        writer: tokio::sync::Mutex::new(writer),
        closed: AtomicBool::new(false),
        close_signal: Notify::new(),
    });

    // A reconnecting peer replaces its previous connection.
    let replaced = ctx
        .conns
        .lock()
        .insert(from_node_id, Arc::clone(&conn));
    if let Some(old) = replaced {
        debug!(node_id = from_node_id, "replacing previous inbound connection");
        old.close().await;
    }

    if conn
        .reply(sequence_id, FrameBody::AuthResponse { is_auth: true })
        .await
        .is_err()
    {
        conn.close().await;
        return;
    }

    loop {
        tokio::select! {
            _ = conn.close_signal.notified() => break,
            item = reader.next() => match item {
                Some(Ok(frame)) => {
                    let request = InboundRequest {
                        frame,
                        conn: Arc::clone(&conn),
                    };
                    if ctx.queue.send(request).await.is_err() {
                        break;
                    }
                }
                Some(Err(err)) => {
                    warn!(node_id = from_node_id, %err, "inbound reader failed");
                    break;
                }
                None => {
                    debug!(node_id = from_node_id, "peer closed inbound connection");
                    break;
                }
            },
        }
    }
    conn.close().await;
}

/// Worker: pops queued requests and dispatches each concurrently.
pub(crate) async fn run_worker(
    mut queue: mpsc::Receiver<InboundRequest>,
    registry: LocalRegistry,
) {
    while let Some(request) = queue.recv().await {
        let registry = registry.clone();
        tokio::spawn(async move {
            dispatch(request, registry).await;
        });
    }
}

/// Serve one request frame and write the response back.
async fn dispatch(request: InboundRequest, registry: LocalRegistry) {
    let InboundRequest { frame, conn } = request;
    if frame.direction != Direction::Request {
        debug!(
            node_id = conn.node_id,
            sequence_id = frame.sequence_id,
            "dropping non-request frame on inbound connection"
        );
        return;
    }
    let sequence_id = frame.sequence_id;

    let response = match frame.body {
        FrameBody::GetNameRequest { name } => {
            let found = registry.by_name(&name);
            FrameBody::GetNameResponse {
                has: found.is_some(),
                actor_id: found.map(|lref| lref.actor_id()).unwrap_or(0),
            }
        }
        FrameBody::SendNameRequest {
            from_id,
            from_name,
            to_name,
            send_data,
        } => {
            let outcome = match registry.by_name(&to_name) {
                None => Err(ActorError::RemoteActorNotFound),
                Some(lref) => {
                    let sender = sender_ref(conn.node_id, from_id, &from_name);
                    lref.send(sender.as_ref(), send_data).await
                }
            };
            match outcome {
                Ok(()) => FrameBody::SendNameResponse {
                    has_error: false,
                    error_message: String::new(),
                },
                Err(err) => FrameBody::SendNameResponse {
                    has_error: true,
                    error_message: err.to_string(),
                },
            }
        }
        FrameBody::AskNameRequest {
            from_id,
            from_name,
            to_name,
            ask_data,
            answer_template,
        } => {
            let template = answer_template.template();
            let outcome = match registry.by_name(&to_name) {
                None => Err(ActorError::RemoteActorNotFound),
                Some(lref) => {
                    let sender = sender_ref(conn.node_id, from_id, &from_name);
                    lref.ask_value(sender.as_ref(), ask_data, &template).await
                }
            };
            match outcome {
                Ok(answer) => FrameBody::AskNameResponse {
                    has_error: false,
                    error_message: String::new(),
                    answer_data: answer,
                },
                Err(err) => FrameBody::AskNameResponse {
                    has_error: true,
                    error_message: err.to_string(),
                    answer_data: template,
                },
            }
        }
        other => {
            warn!(
                node_id = conn.node_id,
                sequence_id,
                kind = ?other.kind(),
                "unexpected request kind on inbound connection"
            );
            return;
        }
    };

    if let Err(err) = conn.reply(sequence_id, response).await {
        debug!(node_id = conn.node_id, sequence_id, %err, "inbound reply failed");
    }
}

/// Reference describing the remote sender of an inbound request.
///
/// Detached: it identifies the caller but is not wired to a connection, so
/// it cannot be used to call back. A zero `from_id` means the peer did not
/// identify a sending actor.
fn sender_ref(node_id: u32, from_id: u32, from_name: &str) -> Option<Ref> {
    if from_id == 0 {
        return None;
    }
    Some(Ref::Remote(RemoteRef::detached(Id::remote(
        node_id, from_id, from_name,
    ))))
}
