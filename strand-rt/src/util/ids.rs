//! Actor identity.

// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
// (none)

/// The node id of local actors.
pub const LOCAL_NODE: u32 = 0;

/// Identity of an actor: owning node, per-node actor id, optional name.
///
/// `node` is zero for local actors. `actor` is nonzero and unique within a
/// node for as long as the instance exists. `name` is empty unless the actor
/// was registered under a unique name.
///
/// An `Id` is a snapshot: the name portion reflects the registration state at
/// the time the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    node: u32,
    actor: u32,
    name: String,
}

impl Id {
    /// Identity of a local actor.
    pub fn local(actor: u32, name: impl Into<String>) -> Self {
        Self {
            node: LOCAL_NODE,
            actor,
            name: name.into(),
        }
    }

    /// Identity of an actor hosted on another node.
    pub fn remote(node: u32, actor: u32, name: impl Into<String>) -> Self {
        Self {
            node,
            actor,
            name: name.into(),
        }
    }

    /// The owning node id; zero means local.
    pub fn node_id(&self) -> u32 {
        self.node
    }

    /// The per-node actor id.
    pub fn actor_id(&self) -> u32 {
        self.actor
    }

    /// The registered name, empty if the actor is anonymous.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this identity refers to an actor on this node.
    pub fn is_local(&self) -> bool {
        self.node == LOCAL_NODE
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}/{}", self.node, self.actor)
        } else {
            write!(f, "{}/{}({})", self.node, self.actor, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_id_has_zero_node() {
        let id = Id::local(7, "");
        assert_eq!(id.node_id(), LOCAL_NODE);
        assert_eq!(id.actor_id(), 7);
        assert!(id.is_local());
        assert_eq!(id.name(), "");
    }

    #[test]
    fn remote_id_is_not_local() {
        let id = Id::remote(3, 12, "svc");
        assert!(!id.is_local());
        assert_eq!(id.name(), "svc");
    }

    #[test]
    fn display_includes_name_when_present() {
        assert_eq!(Id::local(4, "").to_string(), "0/4");
        assert_eq!(Id::remote(2, 9, "room").to_string(), "2/9(room)");
    }
}
