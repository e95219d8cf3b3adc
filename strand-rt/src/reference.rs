//! Unified actor reference.
//!
//! A [`Ref`] is a non-owning capability to send, ask, and shut down,
//! independent of where the actor lives. The local variant points at an
//! instance on this node; the remote variant carries an identity and the
//! outbound connection that reaches its node.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::instance::LocalRef;
use crate::error::ActorError;
use crate::message::value::{FromValue, Value};
use crate::remote::reference::RemoteRef;
use crate::util::Id;

/// Capability handle to an actor, local or remote.
#[derive(Debug, Clone)]
pub enum Ref {
    /// Actor hosted on this node.
    Local(LocalRef),
    /// Actor hosted on a peer node, reached through an outbound connection.
    Remote(RemoteRef),
}

impl Ref {
    /// Snapshot of the target's identity.
    pub fn id(&self) -> Id {
        match self {
            Ref::Local(lref) => lref.id(),
            Ref::Remote(rref) => rref.id(),
        }
    }

    /// Whether the target lives on this node.
    pub fn is_local(&self) -> bool {
        matches!(self, Ref::Local(_))
    }

    /// The local variant, if any.
    pub fn as_local(&self) -> Option<&LocalRef> {
        match self {
            Ref::Local(lref) => Some(lref),
            Ref::Remote(_) => None,
        }
    }

    /// Enqueue a one-way message to the target.
    ///
    /// Local targets reject unless Running; remote targets wait for the
    /// peer's delivery acknowledgement within the request timeout.
    pub async fn send(
        &self,
        sender: Option<&Ref>,
        message: impl Into<Value>,
    ) -> Result<(), ActorError> {
        match self {
            Ref::Local(lref) => lref.send(sender, message).await,
            Ref::Remote(rref) => rref.send(sender, message.into()).await,
        }
    }

    /// Ask the target and wait for a typed answer.
    pub async fn ask<T: FromValue>(
        &self,
        sender: Option<&Ref>,
        message: impl Into<Value>,
    ) -> Result<T, ActorError> {
        match self {
            Ref::Local(lref) => lref.ask(sender, message).await,
            Ref::Remote(rref) => rref.ask(sender, message.into()).await,
        }
    }

    /// Ask with a dynamic answer template instead of a static type.
    pub async fn ask_value(
        &self,
        sender: Option<&Ref>,
        message: impl Into<Value>,
        template: &Value,
    ) -> Result<Value, ActorError> {
        match self {
            Ref::Local(lref) => lref.ask_value(sender, message, template).await,
            Ref::Remote(rref) => rref.ask_value(sender, message.into(), template).await,
        }
    }

    /// Order the target to shut down.
    ///
    /// Remote actors are never shut down through a reference; the remote
    /// variant always fails with `NotLocalActor`.
    pub async fn shutdown(&self, sender: Option<&Ref>) -> Result<(), ActorError> {
        match self {
            Ref::Local(lref) => lref.shutdown(sender).await,
            Ref::Remote(_) => Err(ActorError::NotLocalActor),
        }
    }
}

impl From<LocalRef> for Ref {
    fn from(lref: LocalRef) -> Self {
        Ref::Local(lref)
    }
}

impl From<RemoteRef> for Ref {
    fn from(rref: RemoteRef) -> Self {
        Ref::Remote(rref)
    }
}
