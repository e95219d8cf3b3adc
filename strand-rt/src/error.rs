//! Runtime error types.
//!
//! A single [`ActorError`] enum covers the three boundary taxonomies:
//! local dispatch errors (returned before an envelope is enqueued),
//! handler errors (surfaced only through ask answers), and remote/protocol
//! errors (framing, handshake, correlation).

// Layer 1: Standard library
use std::io;

// Layer 2: Third-party
use thiserror::Error;

// Layer 3: Internal
// (none)

/// Errors surfaced at the runtime boundary.
#[derive(Error, Debug)]
pub enum ActorError {
    /// An operation was attempted in an actor state that does not allow it.
    #[error("actor state error")]
    ActorState,

    /// A caller-supplied argument was missing or malformed.
    #[error("argument error")]
    Argument,

    /// The operation requires a local reference but got a remote one.
    #[error("not a local actor")]
    NotLocalActor,

    /// The target actor is not in the Running state.
    #[error("actor is not running")]
    ActorNotRunning,

    /// The target actor does not implement the ask capability.
    #[error("actor cannot ask")]
    ActorCannotAsk,

    /// The requested name is already bound to a live actor.
    #[error("name registered")]
    NameRegistered,

    /// An ask answer did not match the expected answer type.
    #[error("actor answer type error")]
    AnswerType,

    /// A message payload was rejected by the value policy.
    #[error("message value error")]
    MessageValue,

    /// A node id was zero or otherwise unusable.
    #[error("remote: bad node id")]
    NodeId,

    /// A payload could not be carried by the wire value union on send.
    #[error("remote ref send type error")]
    RemoteRefSendType,

    /// A payload could not be carried by the wire value union on ask.
    #[error("remote ref ask type error")]
    RemoteRefAskType,

    /// A remote answer did not decode into the expected answer type.
    #[error("remote ref answer type error")]
    RemoteRefAnswerType,

    /// The remote manager has not been initialized (or was closed).
    #[error("remote manager is not ready")]
    RemoteManagerNotReady,

    /// No outbound connection exists for the requested node.
    #[error("remote connection not found")]
    RemoteConnNotFound,

    /// The peer replied with an error, or the connection died mid-request.
    #[error("remote request error: {0}")]
    RemoteResponse(String),

    /// A remote request did not complete within the request timeout.
    #[error("remote timeout")]
    RemoteTimeout,

    /// The peer has no running actor under the requested name.
    #[error("remote actor not found")]
    RemoteActorNotFound,

    /// A frame violated the wire format (bad header, oversize, undecodable).
    #[error("invalid packet")]
    PacketInvalid,

    /// The connection is unusable.
    #[error("connection error")]
    ConnError,

    /// The peer rejected the authentication handshake.
    #[error("authentication failed")]
    AuthFailed,

    /// The authentication handshake did not complete in time.
    #[error("authentication timeout")]
    AuthTimeout,

    /// An inbound response could not be written back to the peer.
    #[error("reply failed")]
    ReplyFailed,

    /// A user handler failed or panicked; carried back through ask answers.
    #[error("handler error: {0}")]
    Handler(String),

    /// Transport-level I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ActorError {
    /// Whether this error originated on the remote path.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ActorError::NodeId
                | ActorError::RemoteRefSendType
                | ActorError::RemoteRefAskType
                | ActorError::RemoteRefAnswerType
                | ActorError::RemoteManagerNotReady
                | ActorError::RemoteConnNotFound
                | ActorError::RemoteResponse(_)
                | ActorError::RemoteTimeout
                | ActorError::RemoteActorNotFound
        )
    }

    /// Whether this error must tear the connection down.
    ///
    /// Framing corruption is never recovered; request-level failures are.
    pub fn is_conn_fatal(&self) -> bool {
        matches!(self, ActorError::PacketInvalid | ActorError::Io(_))
    }
}
