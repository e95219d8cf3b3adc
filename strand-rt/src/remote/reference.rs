//! Remote connection handle and remote actor references.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::conn::OutboundConn;
use super::wire::FrameBody;
use crate::error::ActorError;
use crate::message::value::{FromValue, Value, ValueKind};
use crate::reference::Ref;
use crate::util::Id;

/// Handle to an authenticated outbound connection.
///
/// Obtained from the remote manager by dialing or looking up a peer; used
/// to resolve named actors on that peer.
#[derive(Clone)]
pub struct RemoteConn {
    pub(crate) conn: Arc<OutboundConn>,
}

impl RemoteConn {
    /// The peer node this connection reaches.
    pub fn node_id(&self) -> u32 {
        self.conn.node_id()
    }

    /// Resolve a running actor on the peer by name.
    pub async fn by_name(&self, name: &str) -> Result<RemoteRef, ActorError> {
        let frame = self
            .conn
            .request(FrameBody::GetNameRequest {
                name: name.to_string(),
            })
            .await?;
        match frame.body {
            FrameBody::GetNameResponse { has: true, actor_id } => Ok(RemoteRef {
                id: Id::remote(self.conn.node_id(), actor_id, name),
                conn: Some(Arc::clone(&self.conn)),
            }),
            FrameBody::GetNameResponse { has: false, .. } => {
                Err(ActorError::RemoteActorNotFound)
            }
            _ => Err(ActorError::RemoteResponse(
                "unexpected response kind".to_string(),
            )),
        }
    }
}

impl fmt::Debug for RemoteConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConn")
            .field("node_id", &self.node_id())
            .finish()
    }
}

/// Reference to an actor hosted on a peer node.
///
/// Bound to the outbound connection it was resolved through. Detached
/// references (sender identities delivered with inbound requests) carry an
/// identity only and cannot be called.
#[derive(Clone)]
pub struct RemoteRef {
    id: Id,
    conn: Option<Arc<OutboundConn>>,
}

impl RemoteRef {
    /// Identity-only reference, not wired to any connection.
    pub(crate) fn detached(id: Id) -> Self {
        Self { id, conn: None }
    }

    /// Snapshot of the target's identity.
    pub fn id(&self) -> Id {
        self.id.clone()
    }

    fn conn(&self) -> Result<&Arc<OutboundConn>, ActorError> {
        self.conn.as_ref().ok_or(ActorError::RemoteConnNotFound)
    }

    fn sender_identity(sender: Option<&Ref>) -> (u32, String) {
        match sender {
            Some(sender) => {
                let id = sender.id();
                (id.actor_id(), id.name().to_string())
            }
            None => (0, String::new()),
        }
    }

    /// Deliver a one-way message to the remote actor.
    ///
    /// Waits for the peer's delivery acknowledgement; a reported failure
    /// (e.g. the actor is gone) surfaces as `RemoteResponse`.
    pub async fn send(&self, sender: Option<&Ref>, message: Value) -> Result<(), ActorError> {
        let conn = self.conn()?;
        let (from_id, from_name) = Self::sender_identity(sender);
        let frame = conn
            .request(FrameBody::SendNameRequest {
                from_id,
                from_name,
                to_name: self.id.name().to_string(),
                send_data: message,
            })
            .await?;
        match frame.body {
            FrameBody::SendNameResponse {
                has_error: false, ..
            } => Ok(()),
            FrameBody::SendNameResponse {
                has_error: true,
                error_message,
            } => Err(ActorError::RemoteResponse(error_message)),
            _ => Err(ActorError::RemoteResponse(
                "unexpected response kind".to_string(),
            )),
        }
    }

    /// Ask the remote actor and wait for a typed answer.
    ///
    /// The tag of `T` travels with the request as the answer template; the
    /// peer encodes its answer under the same tag.
    pub async fn ask<T: FromValue>(
        &self,
        sender: Option<&Ref>,
        message: Value,
    ) -> Result<T, ActorError> {
        let answer = self.ask_raw(sender, message, T::KIND).await?;
        T::from_value(answer).ok_or(ActorError::RemoteRefAnswerType)
    }

    /// Ask with a dynamic answer template instead of a static type.
    pub async fn ask_value(
        &self,
        sender: Option<&Ref>,
        message: Value,
        template: &Value,
    ) -> Result<Value, ActorError> {
        self.ask_raw(sender, message, template.kind()).await
    }

    async fn ask_raw(
        &self,
        sender: Option<&Ref>,
        message: Value,
        answer_template: ValueKind,
    ) -> Result<Value, ActorError> {
        let conn = self.conn()?;
        let (from_id, from_name) = Self::sender_identity(sender);
        let frame = conn
            .request(FrameBody::AskNameRequest {
                from_id,
                from_name,
                to_name: self.id.name().to_string(),
                ask_data: message,
                answer_template,
            })
            .await?;
        match frame.body {
            FrameBody::AskNameResponse {
                has_error: true,
                error_message,
                ..
            } => Err(ActorError::RemoteResponse(error_message)),
            FrameBody::AskNameResponse {
                has_error: false,
                answer_data,
                ..
            } => {
                if answer_data.kind() != answer_template {
                    return Err(ActorError::RemoteRefAnswerType);
                }
                Ok(answer_data)
            }
            _ => Err(ActorError::RemoteResponse(
                "unexpected response kind".to_string(),
            )),
        }
    }

    /// Remote actors are not shut down through a reference.
    pub async fn shutdown(&self, _sender: Option<&Ref>) -> Result<(), ActorError> {
        Err(ActorError::NotLocalActor)
    }
}

impl fmt::Debug for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRef")
            .field("id", &self.id)
            .field("connected", &self.conn.is_some())
            .finish()
    }
}
