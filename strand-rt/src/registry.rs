//! Local actor registry: id allocation and unique-name bindings.
//!
//! Two mappings: actor id to instance, guarded by one mutex that also
//! serializes id allocation, and name to binding, guarded by a read/write
//! lock. A name reservation is always written before the actor id becomes
//! visible under that name, and at most one binding per name is ever in a
//! live state.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

// Layer 3: Internal module imports
use crate::actor::instance::LocalRef;
use crate::actor::status::ActorStatus;
use crate::error::ActorError;

/// Name binding lifecycle entry.
///
/// Released bindings are rewritten in place with `actor_id` zero and a
/// terminal state; they act as tombstones and may be re-claimed by a later
/// spawn under the same name.
#[derive(Debug, Clone)]
pub struct NameBinding {
    /// Bound actor id; zero once released.
    pub actor_id: u32,
    /// Lifecycle state of the binding.
    pub state: ActorStatus,
    /// Time of the last rewrite.
    pub updated_at: DateTime<Utc>,
}

impl NameBinding {
    fn live(&self) -> bool {
        matches!(
            self.state,
            ActorStatus::StartingUp | ActorStatus::Running
        )
    }
}

struct ActorTable {
    next_id: u32,
    actors: HashMap<u32, LocalRef>,
}

/// Registry of the actors hosted on this node.
///
/// Cloning is cheap and shares the underlying tables.
#[derive(Clone)]
pub struct LocalRegistry {
    table: Arc<Mutex<ActorTable>>,
    names: Arc<RwLock<HashMap<String, NameBinding>>>,
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(ActorTable {
                next_id: 0,
                actors: HashMap::new(),
            })),
            names: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Allocate the next actor id, skipping zero and any live id.
    pub(crate) fn allocate_id(&self) -> u32 {
        let mut table = self.table.lock();
        loop {
            table.next_id = table.next_id.wrapping_add(1);
            let candidate = table.next_id;
            if candidate != 0 && !table.actors.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Attach an instance under its allocated id.
    pub(crate) fn insert(&self, lref: LocalRef) {
        self.table.lock().actors.insert(lref.actor_id(), lref);
    }

    /// Detach an instance once its shutdown completed.
    pub(crate) fn remove(&self, actor_id: u32) {
        self.table.lock().actors.remove(&actor_id);
    }

    /// Reserve `name` for a spawning actor.
    ///
    /// Fails with `NameRegistered` while another binding under this name is
    /// live; a tombstone is overwritten.
    pub(crate) fn reserve_name(&self, actor_id: u32, name: &str) -> Result<(), ActorError> {
        if name.is_empty() {
            return Ok(());
        }
        let mut names = self.names.write();
        if let Some(existing) = names.get(name) {
            if existing.state != ActorStatus::Halt {
                return Err(ActorError::NameRegistered);
            }
        }
        names.insert(
            name.to_string(),
            NameBinding {
                actor_id,
                state: ActorStatus::StartingUp,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Promote a reservation to Running and record the name on the actor.
    pub(crate) fn promote_name(&self, lref: &LocalRef, name: &str) {
        if name.is_empty() {
            return;
        }
        let mut names = self.names.write();
        lref.set_name(name);
        names.insert(
            name.to_string(),
            NameBinding {
                actor_id: lref.actor_id(),
                state: ActorStatus::Running,
                updated_at: Utc::now(),
            },
        );
    }

    /// Rewrite a binding to a terminal stage and clear the actor's name.
    ///
    /// Called twice on the shutdown path (ShuttingDown, then Halt) and once
    /// on spawn failure (Halt). No-op for anonymous actors.
    pub(crate) fn release_name(&self, lref: &LocalRef, name: &str, stage: ActorStatus) {
        if name.is_empty() {
            return;
        }
        debug_assert!(matches!(
            stage,
            ActorStatus::ShuttingDown | ActorStatus::Halt
        ));
        let mut names = self.names.write();
        if !names.contains_key(name) {
            return;
        }
        lref.clear_name();
        names.insert(
            name.to_string(),
            NameBinding {
                actor_id: 0,
                state: stage,
                updated_at: Utc::now(),
            },
        );
    }

    /// Bind a name to an actor that is already Running.
    pub fn register_running(&self, lref: &LocalRef, name: &str) -> Result<(), ActorError> {
        if name.is_empty() {
            return Err(ActorError::Argument);
        }
        if lref.status() != ActorStatus::Running {
            return Err(ActorError::ActorNotRunning);
        }
        if !lref.id().name().is_empty() {
            return Err(ActorError::NameRegistered);
        }
        let mut names = self.names.write();
        if let Some(existing) = names.get(name) {
            if existing.state != ActorStatus::Halt {
                return Err(ActorError::ActorState);
            }
        }
        lref.set_name(name);
        names.insert(
            name.to_string(),
            NameBinding {
                actor_id: lref.actor_id(),
                state: ActorStatus::Running,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Look up an actor by id.
    pub fn by_id(&self, actor_id: u32) -> Option<LocalRef> {
        self.table.lock().actors.get(&actor_id).cloned()
    }

    /// Look up an actor by name; only Running bindings resolve.
    pub fn by_name(&self, name: &str) -> Option<LocalRef> {
        let actor_id = {
            let names = self.names.read();
            let binding = names.get(name)?;
            if binding.state != ActorStatus::Running {
                return None;
            }
            binding.actor_id
        };
        self.by_id(actor_id)
    }

    /// All live bindings whose name contains `fragment`.
    pub fn search_name(&self, fragment: &str) -> HashMap<String, LocalRef> {
        let candidates: Vec<(String, u32)> = {
            let names = self.names.read();
            names
                .iter()
                .filter(|(name, binding)| binding.live() && name.contains(fragment))
                .map(|(name, binding)| (name.clone(), binding.actor_id))
                .collect()
        };
        candidates
            .into_iter()
            .filter_map(|(name, actor_id)| self.by_id(actor_id).map(|lref| (name, lref)))
            .collect()
    }

    /// Number of live actor instances.
    pub fn count(&self) -> usize {
        self.table.lock().actors.len()
    }

    /// Snapshot of a binding, if the name was ever used.
    pub fn binding(&self, name: &str) -> Option<NameBinding> {
        self.names.read().get(name).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mailbox;
    use crate::session::SessionManager;

    fn test_ref(registry: &LocalRegistry) -> LocalRef {
        let (tx, _rx) = mailbox::mailbox(1);
        let lref = LocalRef::new(registry.allocate_id(), tx, SessionManager::new(), false);
        registry.insert(lref.clone());
        lref
    }

    #[test]
    fn allocated_ids_are_nonzero_and_unique() {
        let registry = LocalRegistry::new();
        let a = test_ref(&registry);
        let b = test_ref(&registry);
        assert_ne!(a.actor_id(), 0);
        assert_ne!(b.actor_id(), 0);
        assert_ne!(a.actor_id(), b.actor_id());
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn reservation_blocks_second_spawn() {
        let registry = LocalRegistry::new();
        let a = test_ref(&registry);
        registry.reserve_name(a.actor_id(), "worker").unwrap();
        let b = test_ref(&registry);
        let err = registry.reserve_name(b.actor_id(), "worker").unwrap_err();
        assert!(matches!(err, ActorError::NameRegistered));
    }

    #[test]
    fn by_name_resolves_only_running_bindings() {
        let registry = LocalRegistry::new();
        let a = test_ref(&registry);
        registry.reserve_name(a.actor_id(), "worker").unwrap();
        assert!(registry.by_name("worker").is_none());

        registry.promote_name(&a, "worker");
        let found = registry.by_name("worker").expect("running binding");
        assert_eq!(found.actor_id(), a.actor_id());
        assert_eq!(a.id().name(), "worker");
    }

    #[test]
    fn release_leaves_a_tombstone_that_can_be_reclaimed() {
        let registry = LocalRegistry::new();
        let a = test_ref(&registry);
        registry.reserve_name(a.actor_id(), "worker").unwrap();
        registry.promote_name(&a, "worker");

        registry.release_name(&a, "worker", ActorStatus::ShuttingDown);
        registry.release_name(&a, "worker", ActorStatus::Halt);
        registry.remove(a.actor_id());

        assert!(registry.by_name("worker").is_none());
        assert_eq!(a.id().name(), "");
        let tombstone = registry.binding("worker").expect("tombstone kept");
        assert_eq!(tombstone.actor_id, 0);
        assert_eq!(tombstone.state, ActorStatus::Halt);

        let b = test_ref(&registry);
        registry.reserve_name(b.actor_id(), "worker").unwrap();
        registry.promote_name(&b, "worker");
        assert_eq!(
            registry.by_name("worker").expect("rebound").actor_id(),
            b.actor_id()
        );
    }

    #[test]
    fn register_running_validates_state() {
        let registry = LocalRegistry::new();
        let a = test_ref(&registry);

        // Not running yet.
        let err = registry.register_running(&a, "late").unwrap_err();
        assert!(matches!(err, ActorError::ActorNotRunning));

        a.set_status(ActorStatus::Running);
        registry.register_running(&a, "late").unwrap();
        assert_eq!(a.id().name(), "late");

        // Already named.
        let err = registry.register_running(&a, "other").unwrap_err();
        assert!(matches!(err, ActorError::NameRegistered));

        // Name held by a live binding.
        let b = test_ref(&registry);
        b.set_status(ActorStatus::Running);
        let err = registry.register_running(&b, "late").unwrap_err();
        assert!(matches!(err, ActorError::ActorState));

        // Empty name.
        let err = registry.register_running(&b, "").unwrap_err();
        assert!(matches!(err, ActorError::Argument));
    }

    #[test]
    fn search_name_matches_live_fragments() {
        let registry = LocalRegistry::new();
        let a = test_ref(&registry);
        registry.reserve_name(a.actor_id(), "room-1").unwrap();
        registry.promote_name(&a, "room-1");
        let b = test_ref(&registry);
        registry.reserve_name(b.actor_id(), "room-2").unwrap();
        registry.promote_name(&b, "room-2");
        let c = test_ref(&registry);
        registry.reserve_name(c.actor_id(), "lobby").unwrap();
        registry.promote_name(&c, "lobby");

        let rooms = registry.search_name("room");
        assert_eq!(rooms.len(), 2);
        assert!(rooms.contains_key("room-1"));
        assert!(rooms.contains_key("room-2"));
    }
}
