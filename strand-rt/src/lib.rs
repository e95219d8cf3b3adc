//! # strand-rt - Actor Runtime with Transparent Remote Messaging
//!
//! Sequential, thread-safe message processing per actor with one capability
//! set for local and remote addressing. Each actor owns private state that
//! is mutated only by its own handlers; the runtime guarantees at most one
//! concurrent handler per actor, drives the lifecycle
//! (halt, starting up, running, shutting down, halt), and lets actors on
//! different nodes discover and call one another over a framed TCP protocol.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use strand_rt::prelude::*;
//!
//! struct Greeter;
//!
//! #[async_trait::async_trait]
//! impl Actor for Greeter {
//!     fn actor_type(&self) -> ActorType {
//!         ActorType { name: "greeter", version: 1 }
//!     }
//!
//!     async fn handle_send(
//!         &mut self,
//!         _sender: Option<Ref>,
//!         message: Value,
//!     ) -> Result<(), ActorError> {
//!         println!("got {message:?}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ActorError> {
//!     let system = ActorSystem::default();
//!     let greeter = system.spawn_named(|| Greeter, "greeter", None).await?;
//!     greeter.send(None, "hello").await?;
//!     greeter.shutdown(None).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`actor`] - behavior traits, lifecycle status, and the dispatcher
//! - [`message`] - the typed payload union carried locally and on the wire
//! - [`session`] - ask/answer correlation
//! - [`registry`] - actor ids and unique-name bindings
//! - [`reference`] - the unified local/remote capability handle
//! - [`remote`] - wire protocol, connections, and the node manager
//! - [`system`] - system assembly and configuration
//! - [`util`] - identity types
//!
//! # Concurrency Model
//!
//! One dispatcher task per actor serializes that actor's callbacks; across
//! actors, callbacks run in parallel. Envelopes from one sender to one
//! receiver are handled in enqueue order. Handler panics are caught by the
//! dispatcher: a send handler panic is logged, an ask handler panic
//! completes the session with an internal error, and the next envelope is
//! processed either way.

pub mod actor;
pub mod error;
pub mod message;
pub mod reference;
pub mod registry;
pub mod remote;
pub mod session;
pub mod system;
pub mod util;

pub(crate) mod mailbox;

// Layer 1: Standard library imports
use std::sync::OnceLock;

// Re-export commonly used types
pub use actor::{Actor, ActorAsk, ActorStatus, ActorType, LocalRef};
pub use error::ActorError;
pub use message::{FromValue, ProtoPayload, Value, ValueKind};
pub use reference::Ref;
pub use registry::{LocalRegistry, NameBinding};
pub use remote::{RemoteConn, RemoteManager, RemoteRef};
pub use session::SessionManager;
pub use system::{ActorSystem, Network, NodeConfig, PeerConfig, SystemConfig};
pub use util::Id;

/// Convenient single import for the common API surface.
pub mod prelude {
    pub use crate::actor::{Actor, ActorAsk, ActorStatus, ActorType, LocalRef};
    pub use crate::error::ActorError;
    pub use crate::message::{FromValue, ProtoPayload, Value, ValueKind};
    pub use crate::reference::Ref;
    pub use crate::system::{ActorSystem, Network, NodeConfig, PeerConfig, SystemConfig};
    pub use crate::util::Id;
}

static DEFAULT_SYSTEM: OnceLock<ActorSystem> = OnceLock::new();

/// The process-wide default system, initialized lazily on first use.
///
/// Tests needing isolation construct their own [`ActorSystem`] instead.
pub fn default_system() -> &'static ActorSystem {
    DEFAULT_SYSTEM.get_or_init(ActorSystem::default)
}
