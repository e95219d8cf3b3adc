//! Remote manager: the node's listener and connection tables.
//!
//! Owns the accept loop, the inbound dispatch worker, and two tables keyed
//! by peer node id: inbound connections (accepted and authenticated) and
//! outbound connections (dialed). Until [`RemoteManager::init`] succeeds the
//! manager refuses every operation.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::{Mutex, RwLock};
use tokio::net::{lookup_host, TcpListener};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::conn::OutboundConn;
use super::inbound::{self, InboundConn, InboundContext, INBOUND_QUEUE_LENGTH};
use super::reference::RemoteConn;
use crate::error::ActorError;
use crate::registry::LocalRegistry;
use crate::system::config::{Network, NodeConfig, PeerConfig};

/// Bind a TCP listener under the given network flavor.
async fn net_bind(network: Network, addr: &str) -> Result<TcpListener, ActorError> {
    let mut last_err: Option<std::io::Error> = None;
    for candidate in lookup_host(addr).await?.filter(|a| network.admits(a)) {
        match TcpListener::bind(candidate).await {
            Ok(listener) => return Ok(listener),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.map(ActorError::Io).unwrap_or(ActorError::ConnError))
}

struct RemoteInner {
    registry: LocalRegistry,
    ready: AtomicBool,
    node_id: AtomicU32,
    local_addr: RwLock<Option<SocketAddr>>,
    inbound: Arc<Mutex<HashMap<u32, Arc<InboundConn>>>>,
    outbound: tokio::sync::Mutex<HashMap<u32, Arc<OutboundConn>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Gateway to actors on other nodes.
///
/// Cloning is cheap and shares the underlying state.
#[derive(Clone)]
pub struct RemoteManager {
    inner: Arc<RemoteInner>,
}

impl RemoteManager {
    pub(crate) fn new(registry: LocalRegistry) -> Self {
        Self {
            inner: Arc::new(RemoteInner {
                registry,
                ready: AtomicBool::new(false),
                node_id: AtomicU32::new(0),
                local_addr: RwLock::new(None),
                inbound: Arc::new(Mutex::new(HashMap::new())),
                outbound: tokio::sync::Mutex::new(HashMap::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Whether [`RemoteManager::init`] has succeeded.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// This node's id; zero before init.
    pub fn node_id(&self) -> u32 {
        self.inner.node_id.load(Ordering::SeqCst)
    }

    /// The bound listen address, once initialized.
    ///
    /// Useful when the configured address used port zero.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.read()
    }

    /// Bind the listener and start serving peers.
    pub async fn init(&self, config: NodeConfig) -> Result<(), ActorError> {
        config.validate()?;
        if self.is_ready() {
            return Err(ActorError::RemoteManagerNotReady);
        }

        let listener = net_bind(config.listen_network, &config.listen_address).await?;
        *self.inner.local_addr.write() = listener.local_addr().ok();
        self.inner.node_id.store(config.id, Ordering::SeqCst);

        let (queue_tx, queue_rx) = mpsc::channel(INBOUND_QUEUE_LENGTH);

        let worker = tokio::spawn(inbound::run_worker(
            queue_rx,
            self.inner.registry.clone(),
        ));

        let node_id = config.id;
        let auth_token = config.auth_token;
        let conns = Arc::clone(&self.inner.inbound);
        let acceptor = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!(?peer, "accepted inbound connection");
                        let ctx = InboundContext {
                            node_id,
                            auth_token: auth_token.clone(),
                            conns: Arc::clone(&conns),
                            queue: queue_tx.clone(),
                        };
                        tokio::spawn(inbound::handle_connection(stream, ctx));
                    }
                    Err(err) => {
                        warn!(%err, "listener accept failed");
                        break;
                    }
                }
            }
        });

        {
            let mut tasks = self.inner.tasks.lock();
            tasks.push(worker);
            tasks.push(acceptor);
        }
        self.inner.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Return the existing connection to `peer`, or dial and authenticate a
    /// new one.
    ///
    /// Holding the outbound table lock across the dial serializes concurrent
    /// dials to the same peer.
    pub async fn dial(&self, peer: PeerConfig) -> Result<RemoteConn, ActorError> {
        if !self.is_ready() {
            return Err(ActorError::RemoteManagerNotReady);
        }
        peer.validate()?;

        let mut outbound = self.inner.outbound.lock().await;
        if let Some(conn) = outbound.get(&peer.id) {
            return Ok(RemoteConn {
                conn: Arc::clone(conn),
            });
        }
        let peer_id = peer.id;
        let conn = OutboundConn::dial(self.node_id(), peer).await?;
        outbound.insert(peer_id, Arc::clone(&conn));
        Ok(RemoteConn { conn })
    }

    /// Look up an existing outbound connection.
    pub async fn get_conn(&self, node_id: u32) -> Result<RemoteConn, ActorError> {
        if !self.is_ready() {
            return Err(ActorError::RemoteManagerNotReady);
        }
        let outbound = self.inner.outbound.lock().await;
        outbound
            .get(&node_id)
            .map(|conn| RemoteConn {
                conn: Arc::clone(conn),
            })
            .ok_or(ActorError::RemoteConnNotFound)
    }

    /// Stop serving: close the listener, every connection, and fail every
    /// pending request. Idempotent.
    pub async fn close(&self) {
        if !self.inner.ready.swap(false, Ordering::SeqCst) {
            return;
        }

        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }

        let inbound: Vec<Arc<InboundConn>> = {
            let mut conns = self.inner.inbound.lock();
            conns.drain().map(|(_, conn)| conn).collect()
        };
        for conn in inbound {
            conn.close().await;
        }

        let outbound: Vec<Arc<OutboundConn>> = {
            let mut conns = self.inner.outbound.lock().await;
            conns.drain().map(|(_, conn)| conn).collect()
        };
        for conn in outbound {
            conn.close().await;
        }

        self.inner.node_id.store(0, Ordering::SeqCst);
        *self.inner.local_addr.write() = None;
    }
}
