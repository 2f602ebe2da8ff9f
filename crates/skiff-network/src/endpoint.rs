//! Endpoint directories of running containers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use skiff_common::TypeId;

use crate::ports::PortName;

/// Symbolic port name to a resolvable `"host:port"` address.
///
/// Every container owns two of these: the host-side view (published ports on
/// the host IP) and the container-side view (internal ports on the container
/// IP inside its network).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddrsMap(BTreeMap<PortName, String>);

impl AddrsMap {
    /// Create an empty directory.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record the address of a named port.
    pub fn insert(&mut self, name: PortName, addr: String) {
        self.0.insert(name, addr);
    }

    /// Address of a named port.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Iterate over `(name, address)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&PortName, &str)> {
        self.0.iter().map(|(name, addr)| (name, addr.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Join a host and a port into `"host:port"`, bracketing IPv6 literals.
pub fn join_host_port(host: impl fmt::Display, port: impl fmt::Display) -> String {
    let host = host.to_string();
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// What a network knows about one of its running containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorInfo {
    /// Engine container ID.
    pub id: String,
    /// Registry bucket.
    pub type_id: TypeId,
    /// Container-side endpoints.
    pub container_endpoints: AddrsMap,
    /// Host-side endpoints.
    pub host_endpoints: AddrsMap,
}
