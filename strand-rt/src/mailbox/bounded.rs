//! Bounded mailbox over a tokio mpsc channel.
//!
//! Every actor owns exactly one mailbox. Senders block when the mailbox is
//! full and fail once it is closed; the owning driver is the only consumer.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use crate::error::ActorError;
use crate::message::envelope::Envelope;

/// Create a bounded mailbox of the given capacity.
pub(crate) fn mailbox(capacity: usize) -> (MailboxSender, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MailboxSender { tx }, MailboxReceiver { rx })
}

/// Write end of a mailbox, shared by every reference to the actor.
#[derive(Clone)]
pub(crate) struct MailboxSender {
    tx: mpsc::Sender<Envelope>,
}

impl MailboxSender {
    /// Enqueue an envelope, waiting for capacity.
    ///
    /// Fails with `ActorNotRunning` once the mailbox was closed; the status
    /// check at the reference is advisory and this is the authoritative
    /// rejection for deliveries racing a shutdown.
    pub(crate) async fn deliver(&self, envelope: Envelope) -> Result<(), ActorError> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| ActorError::ActorNotRunning)
    }
}

/// Read end of a mailbox, owned by the actor's driver task.
pub(crate) struct MailboxReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl MailboxReceiver {
    /// Wait for the next envelope; `None` once closed and drained.
    pub(crate) async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Stop accepting new envelopes. Already-buffered envelopes remain
    /// readable through [`MailboxReceiver::drain`].
    pub(crate) fn close(&mut self) {
        self.rx.close();
    }

    /// Pop a buffered envelope without waiting.
    pub(crate) fn drain(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::message::value::Value;

    #[tokio::test]
    async fn delivers_in_order() {
        let (tx, mut rx) = mailbox(4);
        for i in 0..3i32 {
            tx.deliver(Envelope::Send {
                sender: None,
                payload: Value::from(i),
            })
            .await
            .ok();
        }
        for i in 0..3i32 {
            match rx.recv().await {
                Some(Envelope::Send { payload, .. }) => assert_eq!(payload, Value::from(i)),
                other => unreachable!("unexpected envelope: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn closed_mailbox_rejects_delivery() {
        let (tx, mut rx) = mailbox(1);
        rx.close();
        let err = tx
            .deliver(Envelope::Kill { sender: None })
            .await
            .expect_err("closed mailbox must reject");
        assert!(matches!(err, ActorError::ActorNotRunning));
    }

    #[tokio::test]
    async fn drain_returns_buffered_envelopes_after_close() {
        let (tx, mut rx) = mailbox(2);
        tx.deliver(Envelope::Send {
            sender: None,
            payload: Value::from("queued"),
        })
        .await
        .ok();
        rx.close();
        assert!(rx.drain().is_some());
        assert!(rx.drain().is_none());
    }
}
