//! Message payloads.
//!
//! [`Value`] is the tagged payload union used both for local envelopes and
//! for the wire transport; [`envelope`] holds the internal mailbox envelope.

pub(crate) mod envelope;
pub mod value;

pub use value::{FromValue, ProtoPayload, Value, ValueKind};
