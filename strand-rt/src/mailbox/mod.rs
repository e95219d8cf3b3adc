//! Bounded per-actor mailboxes.

pub(crate) mod bounded;

pub(crate) use bounded::{mailbox, MailboxReceiver, MailboxSender};
