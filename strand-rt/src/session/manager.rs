//! Session manager: correlates one asker with one answer.
//!
//! Every ask allocates a session holding a single-use rendezvous slot. The
//! answering side completes the session exactly once; completion after the
//! asker abandoned the slot (timeout, cancellation) is silently discarded.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

// Layer 3: Internal module imports
use crate::error::ActorError;
use crate::message::value::Value;

/// Outcome delivered through a session slot.
pub type AskOutcome = Result<Value, ActorError>;

/// Allocates session ids and parks askers until their answer arrives.
///
/// Cloning is cheap and shares the underlying table.
#[derive(Clone, Default)]
pub struct SessionManager {
    next_id: Arc<Mutex<u64>>,
    sessions: Arc<DashMap<u64, SessionEntry>>,
}

pub(crate) struct SessionEntry {
    tx: oneshot::Sender<AskOutcome>,
    #[allow(dead_code)] // kept for debugging stuck askers
    created_at: DateTime<Utc>,
}

/// One allocated session: the id travels inside the ask envelope, the
/// receiver is awaited by the asker.
pub struct Session {
    pub(crate) id: u64,
    pub(crate) rx: oneshot::Receiver<AskOutcome>,
}

impl Session {
    /// The correlation id of this session; never zero.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session.
    ///
    /// Ids advance monotonically, skipping zero and any id still in flight.
    pub fn new_session(&self) -> Session {
        let id = {
            let mut next = self.next_id.lock();
            loop {
                *next = next.wrapping_add(1);
                if *next != 0 && !self.sessions.contains_key(&*next) {
                    break *next;
                }
            }
        };
        let (tx, rx) = oneshot::channel();
        self.sessions.insert(
            id,
            SessionEntry {
                tx,
                created_at: Utc::now(),
            },
        );
        Session { id, rx }
    }

    /// Remove a session without completing it.
    ///
    /// Used by askers that failed to enqueue their envelope.
    pub fn pop_session(&self, id: u64) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Deliver an outcome to the asker parked on `id`.
    ///
    /// A session is retired exactly once: the entry is removed before the
    /// slot is written. Unknown ids and abandoned slots are dropped.
    pub fn complete(&self, id: u64, outcome: AskOutcome) {
        match self.sessions.remove(&id) {
            Some((_, entry)) => {
                if entry.tx.send(outcome).is_err() {
                    debug!(session_id = id, "answer discarded, asker gone");
                }
            }
            None => debug!(session_id = id, "completion for unknown session"),
        }
    }

    /// Number of sessions currently awaiting an answer.
    pub fn pending_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_ids_are_nonzero_and_unique() {
        let mgr = SessionManager::new();
        let a = mgr.new_session();
        let b = mgr.new_session();
        assert_ne!(a.id(), 0);
        assert_ne!(b.id(), 0);
        assert_ne!(a.id(), b.id());
        assert_eq!(mgr.pending_count(), 2);
    }

    #[tokio::test]
    async fn complete_delivers_to_the_asker() {
        let mgr = SessionManager::new();
        let session = mgr.new_session();
        mgr.complete(session.id, Ok(Value::from("answer")));
        let outcome = session.rx.await.expect("slot written");
        assert_eq!(outcome.unwrap(), Value::from("answer"));
        assert_eq!(mgr.pending_count(), 0);
    }

    #[tokio::test]
    async fn complete_is_exactly_once() {
        let mgr = SessionManager::new();
        let session = mgr.new_session();
        let id = session.id;
        mgr.complete(id, Ok(Value::from(1i64)));
        // Second completion finds no entry and is dropped.
        mgr.complete(id, Ok(Value::from(2i64)));
        let outcome = session.rx.await.expect("slot written");
        assert_eq!(outcome.unwrap(), Value::from(1i64));
    }

    #[tokio::test]
    async fn completion_after_abandonment_is_discarded() {
        let mgr = SessionManager::new();
        let session = mgr.new_session();
        let id = session.id;
        drop(session.rx);
        // Must not panic or error; the entry is still retired.
        mgr.complete(id, Ok(Value::from(true)));
        assert_eq!(mgr.pending_count(), 0);
    }

    #[tokio::test]
    async fn pop_session_removes_without_completing() {
        let mgr = SessionManager::new();
        let session = mgr.new_session();
        assert!(mgr.pop_session(session.id));
        assert!(!mgr.pop_session(session.id));
        assert_eq!(mgr.pending_count(), 0);
    }

    #[tokio::test]
    async fn error_outcomes_travel_through_the_slot() {
        let mgr = SessionManager::new();
        let session = mgr.new_session();
        mgr.complete(session.id, Err(ActorError::ActorCannotAsk));
        let outcome = session.rx.await.expect("slot written");
        assert!(matches!(outcome, Err(ActorError::ActorCannotAsk)));
    }
}
