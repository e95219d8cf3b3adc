//! Actor instance cell and the per-actor dispatcher.
//!
//! The runtime owns each spawned behavior through exactly one dispatcher
//! task; [`LocalRef`] is the non-owning capability handed to everyone else.
//! The dispatcher serializes mailbox consumption, so at most one behavior
//! callback of a given actor runs at any instant.

// Layer 1: Standard library imports
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error};

// Layer 3: Internal module imports
use super::status::ActorStatus;
use super::traits::Actor;
use crate::error::ActorError;
use crate::mailbox::{MailboxReceiver, MailboxSender};
use crate::message::envelope::Envelope;
use crate::message::value::{FromValue, Value};
use crate::reference::Ref;
use crate::registry::LocalRegistry;
use crate::session::SessionManager;
use crate::util::Id;

/// Shared state of one actor instance.
///
/// The behavior object itself lives in the dispatcher task; the cell only
/// carries what senders need: identity, status, mailbox, and the spawn-time
/// ask-capability decision.
pub(crate) struct ActorCell {
    actor_id: u32,
    name: RwLock<String>,
    status: RwLock<ActorStatus>,
    mailbox: MailboxSender,
    supports_ask: bool,
    sessions: SessionManager,
}

/// Reference to an actor hosted on this node.
///
/// Cloning is cheap; all clones address the same instance. The instance
/// outlives any particular reference and is destroyed only by its own
/// dispatcher after a kill order.
#[derive(Clone)]
pub struct LocalRef {
    pub(crate) cell: Arc<ActorCell>,
}

impl LocalRef {
    pub(crate) fn new(
        actor_id: u32,
        mailbox: MailboxSender,
        sessions: SessionManager,
        supports_ask: bool,
    ) -> Self {
        Self {
            cell: Arc::new(ActorCell {
                actor_id,
                name: RwLock::new(String::new()),
                status: RwLock::new(ActorStatus::Halt),
                mailbox,
                supports_ask,
                sessions,
            }),
        }
    }

    /// Snapshot of this actor's identity.
    pub fn id(&self) -> Id {
        Id::local(self.cell.actor_id, self.cell.name.read().clone())
    }

    /// The per-node actor id.
    pub fn actor_id(&self) -> u32 {
        self.cell.actor_id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ActorStatus {
        *self.cell.status.read()
    }

    /// Whether this instance answers asks.
    pub fn supports_ask(&self) -> bool {
        self.cell.supports_ask
    }

    /// Enqueue a one-way message.
    ///
    /// The payload is moved into the receiving actor. Envelopes from one
    /// sender are handled in enqueue order; the status check is advisory and
    /// a delivery racing a shutdown fails with `ActorNotRunning` as well.
    pub async fn send(
        &self,
        sender: Option<&Ref>,
        message: impl Into<Value>,
    ) -> Result<(), ActorError> {
        if !self.status().accepts_messages() {
            return Err(ActorError::ActorNotRunning);
        }
        self.cell
            .mailbox
            .deliver(Envelope::Send {
                sender: sender.cloned(),
                payload: message.into(),
            })
            .await
    }

    /// Ask and wait for a typed answer.
    ///
    /// Blocks until the answer arrives; callers enforce their own deadlines.
    /// The answer's runtime tag must match `T`, otherwise `AnswerType`.
    pub async fn ask<T: FromValue>(
        &self,
        sender: Option<&Ref>,
        message: impl Into<Value>,
    ) -> Result<T, ActorError> {
        let answer = self.ask_raw(sender, message.into()).await?;
        T::from_value(answer).ok_or(ActorError::AnswerType)
    }

    /// Ask with a dynamic answer template instead of a static type.
    ///
    /// The answer must carry the same tag as `template`.
    pub async fn ask_value(
        &self,
        sender: Option<&Ref>,
        message: impl Into<Value>,
        template: &Value,
    ) -> Result<Value, ActorError> {
        let answer = self.ask_raw(sender, message.into()).await?;
        if answer.kind() != template.kind() {
            return Err(ActorError::AnswerType);
        }
        Ok(answer)
    }

    pub(crate) async fn ask_raw(
        &self,
        sender: Option<&Ref>,
        message: Value,
    ) -> Result<Value, ActorError> {
        if !self.status().accepts_messages() {
            return Err(ActorError::ActorNotRunning);
        }
        if !self.cell.supports_ask {
            return Err(ActorError::ActorCannotAsk);
        }
        let session = self.cell.sessions.new_session();
        let session_id = session.id;
        let delivery = self
            .cell
            .mailbox
            .deliver(Envelope::Ask {
                sender: sender.cloned(),
                session_id,
                payload: message,
            })
            .await;
        if let Err(err) = delivery {
            self.cell.sessions.pop_session(session_id);
            return Err(err);
        }
        match session.rx.await {
            Ok(outcome) => outcome,
            // The session slot vanished without an answer: the mailbox was
            // closed between enqueue and handling.
            Err(_) => Err(ActorError::ActorNotRunning),
        }
    }

    /// Order this actor to shut down. Does not wait for completion.
    pub async fn shutdown(&self, sender: Option<&Ref>) -> Result<(), ActorError> {
        if !self.status().accepts_messages() {
            return Err(ActorError::ActorNotRunning);
        }
        self.cell
            .mailbox
            .deliver(Envelope::Kill {
                sender: sender.cloned(),
            })
            .await
    }

    pub(crate) fn set_status(&self, status: ActorStatus) {
        let mut current = self.cell.status.write();
        debug_assert!(
            current.can_transition_to(status),
            "illegal status transition {current:?} -> {status:?}"
        );
        *current = status;
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.cell.name.write() = name.to_string();
    }

    pub(crate) fn clear_name(&self) {
        self.cell.name.write().clear();
    }

    pub(crate) fn sessions(&self) -> &SessionManager {
        &self.cell.sessions
    }
}

impl fmt::Debug for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalRef")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

/// Dispatcher loop of one actor. Spawned once per instance; the behavior
/// object is owned here and dropped when the loop exits.
pub(crate) async fn drive(
    mut actor: Box<dyn Actor>,
    lref: LocalRef,
    mut mailbox: MailboxReceiver,
    registry: LocalRegistry,
) {
    let actor_type = actor.actor_type();
    let actor_id = lref.actor_id();

    if let Err(panic) = guarded(actor.started()).await {
        error!(actor = actor_type.name, actor_id, panic = %panic, "started hook panicked");
    }

    while let Some(envelope) = mailbox.recv().await {
        match envelope {
            Envelope::Send { sender, payload } => {
                match guarded(actor.handle_send(sender, payload)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        debug!(actor = actor_type.name, actor_id, %err, "send handler error");
                    }
                    Err(panic) => {
                        error!(actor = actor_type.name, actor_id, panic = %panic, "send handler panicked");
                    }
                }
            }
            Envelope::Ask {
                sender,
                session_id,
                payload,
            } => {
                // The answer delivery must always occur so the asker is
                // never stranded, whatever the handler does.
                let outcome = match actor.ask_capability() {
                    None => Err(ActorError::ActorCannotAsk),
                    Some(behavior) => match guarded(behavior.handle_ask(sender, payload)).await {
                        Ok(outcome) => outcome,
                        Err(panic) => {
                            error!(actor = actor_type.name, actor_id, panic = %panic, "ask handler panicked");
                            Err(ActorError::Handler("ask handler panicked".to_string()))
                        }
                    },
                };
                lref.sessions().complete(session_id, outcome);
            }
            Envelope::Kill { sender: _ } => {
                let name = lref.id().name().to_string();
                lref.set_status(ActorStatus::ShuttingDown);
                registry.release_name(&lref, &name, ActorStatus::ShuttingDown);
                mailbox.close();
                if let Err(panic) = guarded(actor.shutdown()).await {
                    error!(actor = actor_type.name, actor_id, panic = %panic, "shutdown hook panicked");
                }
                // Envelopes queued behind the kill are rejected; parked
                // askers wake up instead of waiting forever.
                while let Some(stale) = mailbox.drain() {
                    let session_id = stale.session_id();
                    if session_id != 0 {
                        lref.sessions()
                            .complete(session_id, Err(ActorError::ActorNotRunning));
                    }
                }
                registry.release_name(&lref, &name, ActorStatus::Halt);
                registry.remove(actor_id);
                lref.set_status(ActorStatus::Halt);
                break;
            }
        }
    }

    debug!(actor = actor_type.name, actor_id, "dispatcher exited");
}

/// Run a behavior callback with panic isolation.
///
/// Returns the callback result, or the panic message when it unwound. The
/// dispatcher continues either way; panics never terminate the process.
pub(crate) async fn guarded<F: Future>(fut: F) -> Result<F::Output, String> {
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(panic_message)
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
