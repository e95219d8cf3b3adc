//! The actor system: spawn protocol, lookups, and the remote gateway.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tracing::debug;

// Layer 3: Internal module imports
use super::config::SystemConfig;
use crate::actor::instance::{self, LocalRef};
use crate::actor::status::ActorStatus;
use crate::actor::traits::Actor;
use crate::error::ActorError;
use crate::mailbox;
use crate::message::value::Value;
use crate::reference::Ref;
use crate::registry::LocalRegistry;
use crate::remote::RemoteManager;
use crate::session::SessionManager;

struct SystemCore {
    config: SystemConfig,
    registry: LocalRegistry,
    sessions: SessionManager,
    remote: RemoteManager,
}

/// A process-wide actor runtime.
///
/// Owns the local registry, the session manager, and the remote gateway.
/// Cloning is cheap and shares the same runtime; most programs use the
/// process-wide [`default_system`](crate::default_system), while tests
/// construct isolated instances.
#[derive(Clone)]
pub struct ActorSystem {
    core: Arc<SystemCore>,
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new(SystemConfig::default())
    }
}

impl ActorSystem {
    /// Create an isolated runtime with the given configuration.
    pub fn new(config: SystemConfig) -> Self {
        let registry = LocalRegistry::new();
        let sessions = SessionManager::new();
        let remote = RemoteManager::new(registry.clone());
        Self {
            core: Arc::new(SystemCore {
                config,
                registry,
                sessions,
                remote,
            }),
        }
    }

    /// The system configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.core.config
    }

    /// The remote gateway of this runtime.
    pub fn remote(&self) -> &RemoteManager {
        &self.core.remote
    }

    /// Spawn an anonymous actor.
    ///
    /// The factory constructs the behavior; `arg` is handed to `start_up`.
    pub async fn spawn<A, F>(&self, factory: F, arg: Option<Value>) -> Result<LocalRef, ActorError>
    where
        A: Actor,
        F: FnOnce() -> A,
    {
        self.spawn_boxed(Box::new(factory()), "", arg).await
    }

    /// Spawn an actor under a unique name.
    ///
    /// The name is reserved before `start_up` runs and promoted together
    /// with the Running transition; a conflicting live binding fails the
    /// spawn with `NameRegistered` before the behavior is started.
    pub async fn spawn_named<A, F>(
        &self,
        factory: F,
        name: &str,
        arg: Option<Value>,
    ) -> Result<LocalRef, ActorError>
    where
        A: Actor,
        F: FnOnce() -> A,
    {
        self.spawn_boxed(Box::new(factory()), name, arg).await
    }

    /// Spawn protocol. Every effect is reversed exactly once on failure.
    async fn spawn_boxed(
        &self,
        mut actor: Box<dyn Actor>,
        name: &str,
        arg: Option<Value>,
    ) -> Result<LocalRef, ActorError> {
        let registry = &self.core.registry;
        let actor_type = actor.actor_type();
        let supports_ask = actor.ask_capability().is_some();

        let (mailbox_tx, mailbox_rx) = mailbox::mailbox(self.core.config.mailbox_capacity);
        let actor_id = registry.allocate_id();
        let lref = LocalRef::new(actor_id, mailbox_tx, self.core.sessions.clone(), supports_ask);
        registry.insert(lref.clone());

        if let Err(err) = registry.reserve_name(actor_id, name) {
            registry.remove(actor_id);
            return Err(err);
        }

        lref.set_status(ActorStatus::StartingUp);
        let startup = instance::guarded(actor.start_up(&lref, arg)).await;
        let failure = match startup {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(panic) => Some(ActorError::Handler(panic)),
        };
        if let Some(err) = failure {
            registry.release_name(&lref, name, ActorStatus::Halt);
            registry.remove(actor_id);
            lref.set_status(ActorStatus::Halt);
            debug!(actor = actor_type.name, actor_id, %err, "spawn failed in start_up");
            return Err(err);
        }

        lref.set_status(ActorStatus::Running);
        registry.promote_name(&lref, name);

        tokio::spawn(instance::drive(
            actor,
            lref.clone(),
            mailbox_rx,
            registry.clone(),
        ));

        debug!(actor = actor_type.name, actor_id, name, "actor spawned");
        Ok(lref)
    }

    /// Late-bind a name to an already Running local actor.
    pub fn register(&self, target: &Ref, name: &str) -> Result<(), ActorError> {
        match target {
            Ref::Local(lref) => self.core.registry.register_running(lref, name),
            Ref::Remote(_) => Err(ActorError::NotLocalActor),
        }
    }

    /// Look up a local actor by id.
    pub fn by_id(&self, actor_id: u32) -> Option<LocalRef> {
        self.core.registry.by_id(actor_id)
    }

    /// Look up a local actor by registered name.
    pub fn by_name(&self, name: &str) -> Option<LocalRef> {
        self.core.registry.by_name(name)
    }

    /// All live registrations whose name contains `fragment`.
    pub fn search_name(&self, fragment: &str) -> HashMap<String, LocalRef> {
        self.core.registry.search_name(fragment)
    }

    /// Number of live actors on this node.
    pub fn actor_count(&self) -> usize {
        self.core.registry.count()
    }
}
