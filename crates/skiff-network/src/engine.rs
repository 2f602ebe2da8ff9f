//! Network side of the container engine.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use skiff_common::EngineError;

use crate::cidr::Ipv4Cidr;

/// A network as the engine describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkResource {
    /// Engine network ID.
    pub id: String,
    /// Network name.
    pub name: String,
    /// Address range, if the network has IPAM configured.
    pub subnet: Option<Ipv4Cidr>,
    /// Gateway address.
    pub gateway: Option<Ipv4Addr>,
}

/// Network operations a container engine backend must provide.
#[async_trait]
pub trait NetworkEngine: Send + Sync {
    /// List every network currently defined on the engine.
    async fn list_networks(&self) -> Result<Vec<NetworkResource>, EngineError>;

    /// Create a network, optionally pinned to `subnet`.
    async fn create_network(
        &self,
        name: &str,
        subnet: Option<Ipv4Cidr>,
    ) -> Result<NetworkResource, EngineError>;

    /// Remove a network.
    async fn remove_network(&self, id: &str) -> Result<(), EngineError>;

    /// Addresses currently bound by live members of a network.
    async fn network_members(&self, id: &str) -> Result<Vec<Ipv4Addr>, EngineError>;
}
