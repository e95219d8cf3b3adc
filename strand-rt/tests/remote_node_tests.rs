//! End-to-end tests across two nodes in one process: handshake, name
//! resolution, remote send/ask, and timeout behavior.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use strand_rt::prelude::*;

fn node_config(id: u32, token: &str) -> NodeConfig {
    NodeConfig {
        id,
        listen_network: Network::Tcp,
        listen_address: "127.0.0.1:0".to_string(),
        auth_token: token.to_string(),
    }
}

fn peer_config(id: u32, addr: SocketAddr, token: &str) -> PeerConfig {
    PeerConfig {
        id,
        network: Network::Tcp,
        address: addr.to_string(),
        auth_token: token.to_string(),
    }
}

async fn start_node(id: u32, token: &str) -> (ActorSystem, SocketAddr) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let system = ActorSystem::default();
    system
        .remote()
        .init(node_config(id, token))
        .await
        .expect("node init");
    let addr = system.remote().local_addr().expect("bound address");
    (system, addr)
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition met in time");
}

/// Answers asks with the reversed question.
struct Reverser;

#[async_trait]
impl Actor for Reverser {
    fn actor_type(&self) -> ActorType {
        ActorType {
            name: "reverser",
            version: 1,
        }
    }

    async fn handle_send(
        &mut self,
        _sender: Option<Ref>,
        _message: Value,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    fn ask_capability(&mut self) -> Option<&mut dyn ActorAsk> {
        Some(self)
    }
}

#[async_trait]
impl ActorAsk for Reverser {
    async fn handle_ask(
        &mut self,
        sender: Option<Ref>,
        ask: Value,
    ) -> Result<Value, ActorError> {
        // Inbound requests surface the caller's identity, detached from any
        // connection.
        if let Some(sender) = sender {
            assert!(!sender.id().is_local());
        }
        match String::from_value(ask) {
            Some(text) => Ok(Value::from(text.chars().rev().collect::<String>())),
            None => Err(ActorError::MessageValue),
        }
    }
}

/// Collects every string payload it receives.
struct Collector {
    received: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Actor for Collector {
    fn actor_type(&self) -> ActorType {
        ActorType {
            name: "collector",
            version: 1,
        }
    }

    async fn handle_send(
        &mut self,
        _sender: Option<Ref>,
        message: Value,
    ) -> Result<(), ActorError> {
        if let Some(text) = String::from_value(message) {
            self.received.lock().push(text);
        }
        Ok(())
    }
}

/// Sleeps past the request timeout before answering.
struct Sluggish;

#[async_trait]
impl Actor for Sluggish {
    fn actor_type(&self) -> ActorType {
        ActorType {
            name: "sluggish",
            version: 1,
        }
    }

    async fn handle_send(
        &mut self,
        _sender: Option<Ref>,
        _message: Value,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    fn ask_capability(&mut self) -> Option<&mut dyn ActorAsk> {
        Some(self)
    }
}

#[async_trait]
impl ActorAsk for Sluggish {
    async fn handle_ask(
        &mut self,
        _sender: Option<Ref>,
        ask: Value,
    ) -> Result<Value, ActorError> {
        tokio::time::sleep(Duration::from_secs(7)).await;
        Ok(ask)
    }
}

#[tokio::test]
async fn wrong_token_fails_the_handshake() {
    let (_sys1, addr1) = start_node(1, "t1").await;
    let (sys2, _addr2) = start_node(2, "t2").await;

    let err = sys2
        .remote()
        .dial(peer_config(1, addr1, "x"))
        .await
        .expect_err("handshake must fail");
    assert!(matches!(err, ActorError::AuthFailed));

    // The failed dial left no outbound table entry behind.
    assert!(matches!(
        sys2.remote().get_conn(1).await,
        Err(ActorError::RemoteConnNotFound)
    ));
}

#[tokio::test]
async fn mismatched_target_node_id_is_refused() {
    let (_sys1, addr1) = start_node(1, "secret").await;
    let (sys2, _addr2) = start_node(2, "other").await;

    // The listener is node 1; presenting it as node 9 must be rejected.
    let err = sys2
        .remote()
        .dial(peer_config(9, addr1, "secret"))
        .await
        .expect_err("node id mismatch");
    assert!(matches!(err, ActorError::AuthFailed));
}

#[tokio::test]
async fn remote_ask_round_trips_through_get_name() {
    let (sys1, addr1) = start_node(1, "secret").await;
    let (sys2, _addr2) = start_node(2, "other").await;

    sys1.spawn_named(|| Reverser, "svc", None)
        .await
        .expect("spawn reverser");

    let conn = sys2
        .remote()
        .dial(peer_config(1, addr1, "secret"))
        .await
        .expect("dial");
    let svc = conn.by_name("svc").await.expect("resolve svc");
    assert_eq!(svc.id().node_id(), 1);
    assert_eq!(svc.id().name(), "svc");

    let answer: String = svc.ask(None, Value::from("abc")).await.expect("remote ask");
    assert_eq!(answer, "cba");

    // Dialing again reuses the authenticated connection.
    sys2.remote()
        .dial(peer_config(1, addr1, "secret"))
        .await
        .expect("re-dial");
    assert!(sys2.remote().get_conn(1).await.is_ok());
}

#[tokio::test]
async fn remote_send_reaches_the_named_actor() {
    let (sys1, addr1) = start_node(1, "secret").await;
    let (sys2, _addr2) = start_node(2, "other").await;

    let received = Arc::new(Mutex::new(Vec::new()));
    {
        let received = Arc::clone(&received);
        sys1.spawn_named(move || Collector { received }, "sink", None)
            .await
            .expect("spawn collector");
    }

    let conn = sys2
        .remote()
        .dial(peer_config(1, addr1, "secret"))
        .await
        .expect("dial");
    let sink = conn.by_name("sink").await.expect("resolve sink");
    sink.send(None, Value::from("over the wire"))
        .await
        .expect("remote send");

    eventually(|| received.lock().first().map(String::as_str) == Some("over the wire")).await;
}

#[tokio::test]
async fn unknown_names_and_missing_capabilities_are_reported() {
    let (sys1, addr1) = start_node(1, "secret").await;
    let (sys2, _addr2) = start_node(2, "other").await;

    let received = Arc::new(Mutex::new(Vec::new()));
    {
        let received = Arc::clone(&received);
        sys1.spawn_named(move || Collector { received }, "sink", None)
            .await
            .expect("spawn collector");
    }

    let conn = sys2
        .remote()
        .dial(peer_config(1, addr1, "secret"))
        .await
        .expect("dial");

    let err = conn.by_name("nobody").await.expect_err("unknown name");
    assert!(matches!(err, ActorError::RemoteActorNotFound));

    // Asking an actor without the ask capability surfaces the peer's error.
    let sink = conn.by_name("sink").await.expect("resolve sink");
    let err = sink
        .ask::<String>(None, Value::from("q"))
        .await
        .expect_err("collector cannot ask");
    match err {
        ActorError::RemoteResponse(message) => assert!(message.contains("cannot ask")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn remote_shutdown_is_forbidden() {
    let (sys1, addr1) = start_node(1, "secret").await;
    let (sys2, _addr2) = start_node(2, "other").await;

    sys1.spawn_named(|| Reverser, "svc", None)
        .await
        .expect("spawn reverser");
    let conn = sys2
        .remote()
        .dial(peer_config(1, addr1, "secret"))
        .await
        .expect("dial");
    let svc = conn.by_name("svc").await.expect("resolve svc");

    let err = Ref::Remote(svc)
        .shutdown(None)
        .await
        .expect_err("remote shutdown unsupported");
    assert!(matches!(err, ActorError::NotLocalActor));
}

#[tokio::test]
async fn slow_answers_become_remote_timeouts() {
    let (sys1, addr1) = start_node(1, "secret").await;
    let (sys2, _addr2) = start_node(2, "other").await;

    sys1.spawn_named(|| Sluggish, "slow", None)
        .await
        .expect("spawn sluggish");
    let conn = sys2
        .remote()
        .dial(peer_config(1, addr1, "secret"))
        .await
        .expect("dial");
    let slow = conn.by_name("slow").await.expect("resolve slow");

    let err = slow
        .ask::<String>(None, Value::from("ping"))
        .await
        .expect_err("must time out");
    assert!(matches!(err, ActorError::RemoteTimeout));

    // Once the serving node is gone, outstanding references fail fast.
    sys1.remote().close().await;
    let err = slow
        .ask::<String>(None, Value::from("ping"))
        .await
        .expect_err("peer is gone");
    assert!(err.is_remote() || matches!(err, ActorError::ConnError | ActorError::Io(_)));
}

#[tokio::test]
async fn non_auth_first_frame_is_refused_and_the_connection_closed() {
    use futures::{SinkExt, StreamExt};
    use strand_rt::remote::wire::{Frame, FrameBody, FrameCodec};
    use tokio_util::codec::Framed;

    let (_sys1, addr1) = start_node(1, "secret").await;
    let stream = tokio::net::TcpStream::connect(addr1)
        .await
        .expect("raw connect");
    let mut framed = Framed::new(stream, FrameCodec::new());

    framed
        .send(Frame::request(
            1,
            FrameBody::GetNameRequest {
                name: "svc".to_string(),
            },
        ))
        .await
        .expect("write frame");

    let reply = framed
        .next()
        .await
        .expect("one frame before close")
        .expect("decodable frame");
    assert!(matches!(
        reply.body,
        FrameBody::AuthResponse { is_auth: false }
    ));

    // Nothing but a refusal ever comes back; the connection is closed.
    match framed.next().await {
        None | Some(Err(_)) => {}
        Some(Ok(frame)) => panic!("unexpected frame after refusal: {frame:?}"),
    }
}

#[tokio::test]
async fn uninitialized_manager_refuses_operations() {
    let system = ActorSystem::default();
    let err = system
        .remote()
        .dial(peer_config(1, "127.0.0.1:1".parse().unwrap(), "t"))
        .await
        .expect_err("manager not ready");
    assert!(matches!(err, ActorError::RemoteManagerNotReady));

    let err = system.remote().get_conn(1).await.expect_err("not ready");
    assert!(matches!(err, ActorError::RemoteManagerNotReady));
}
