//! Runtime and node configuration with sensible defaults.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::error::ActorError;

/// Default mailbox capacity for newly spawned actors.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 16;

/// Default listen address of the remote manager.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:12345";

/// TCP flavor used for listening and dialing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Either address family.
    #[default]
    Tcp,
    /// IPv4 only.
    Tcp4,
    /// IPv6 only.
    Tcp6,
}

impl Network {
    /// Whether a resolved address is usable under this flavor.
    pub(crate) fn admits(self, addr: &std::net::SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

/// System-wide configuration for the local runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Mailbox capacity for spawned actors.
    pub mailbox_capacity: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl SystemConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ActorError> {
        if self.mailbox_capacity == 0 {
            return Err(ActorError::Argument);
        }
        Ok(())
    }
}

/// Identity and listen surface of this node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's identity; must be nonzero.
    pub id: u32,
    /// TCP flavor of the listener.
    pub listen_network: Network,
    /// Bind address of the listener.
    pub listen_address: String,
    /// Shared secret expected from dialing peers.
    pub auth_token: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: 0,
            listen_network: Network::Tcp,
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            auth_token: String::new(),
        }
    }
}

impl NodeConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ActorError> {
        if self.id == 0 {
            return Err(ActorError::NodeId);
        }
        if self.listen_address.is_empty() {
            return Err(ActorError::Argument);
        }
        Ok(())
    }
}

/// Dial-time description of a peer node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// The peer's node id; must be nonzero.
    pub id: u32,
    /// TCP flavor used for the dial.
    pub network: Network,
    /// The peer's listen address.
    pub address: String,
    /// Secret presented during the handshake.
    pub auth_token: String,
}

impl PeerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ActorError> {
        if self.id == 0 {
            return Err(ActorError::NodeId);
        }
        if self.address.is_empty() {
            return Err(ActorError::Argument);
        }
        Ok(())
    }
}
