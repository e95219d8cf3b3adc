//! Actor behavior traits.
//!
//! [`Actor`] is the required base capability: every actor can receive
//! one-way messages and observe its own lifecycle. [`ActorAsk`] is the
//! optional sibling capability for request/answer exchanges; whether an
//! instance provides it is decided once, at spawn time, through
//! [`Actor::ask_capability`].
//!
//! All callbacks of one actor run on that actor's dispatcher task and are
//! never reentered; across actors they run in parallel. A handler that
//! blocks its dispatcher delays every later message in the mailbox,
//! including the kill order.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::instance::LocalRef;
use crate::error::ActorError;
use crate::message::value::Value;
use crate::reference::Ref;

/// Behavior type descriptor, used for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorType {
    /// Behavior name.
    pub name: &'static str,
    /// Behavior version.
    pub version: u32,
}

/// Required behavior of every actor.
///
/// # Example
///
/// ```rust,ignore
/// struct Counter {
///     count: u64,
/// }
///
/// #[async_trait]
/// impl Actor for Counter {
///     fn actor_type(&self) -> ActorType {
///         ActorType { name: "counter", version: 1 }
///     }
///
///     async fn handle_send(
///         &mut self,
///         _sender: Option<Ref>,
///         _message: Value,
///     ) -> Result<(), ActorError> {
///         self.count += 1;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Actor: Send + 'static {
    /// Descriptor of this behavior.
    fn actor_type(&self) -> ActorType;

    /// Called during spawn, before the actor becomes visible as Running.
    ///
    /// `self_ref` is the reference under which the actor will be reachable;
    /// it may be stored for later sends to self. An error (or panic) here
    /// fails the spawn and reverses every prior spawn effect.
    async fn start_up(
        &mut self,
        _self_ref: &LocalRef,
        _arg: Option<Value>,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    /// Called by the dispatcher once, before the first envelope.
    async fn started(&mut self) {}

    /// Handle a one-way message.
    ///
    /// There is no return channel to the sender: errors are logged by the
    /// dispatcher and the next envelope is processed. Do not block longer
    /// than necessary; sends from within a handler to the actor's own full
    /// mailbox deadlock the dispatcher.
    async fn handle_send(&mut self, sender: Option<Ref>, message: Value)
        -> Result<(), ActorError>;

    /// Called when a kill order is processed, after the mailbox closed.
    ///
    /// This is the last chance to persist state; the behavior object is
    /// dropped when it returns.
    async fn shutdown(&mut self) {}

    /// The optional ask capability of this instance.
    ///
    /// Implementations that answer asks override this to return `Some(self)`;
    /// the decision is read once at spawn time and stored on the reference.
    fn ask_capability(&mut self) -> Option<&mut dyn ActorAsk> {
        None
    }
}

/// Optional capability: answering asks.
#[async_trait]
pub trait ActorAsk: Send {
    /// Handle a request and produce the answer delivered to the asker.
    ///
    /// Both the `Ok` value and the error travel back through the session;
    /// the asker is never left waiting.
    async fn handle_ask(
        &mut self,
        sender: Option<Ref>,
        ask: Value,
    ) -> Result<Value, ActorError>;
}
