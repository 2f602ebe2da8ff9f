//! Isolated networks containers are attached to.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cidr::Ipv4Cidr;
use crate::endpoint::OrchestratorInfo;
use crate::engine::{NetworkEngine, NetworkResource};
use crate::range::SubnetRange;
use crate::registry::NetworkRegistry;

/// A network as seen by the containers attached to it.
#[async_trait]
pub trait Network: Send + Sync {
    /// Engine network ID.
    fn id(&self) -> &str;

    /// Network name.
    fn name(&self) -> &str;

    /// Gateway address, if known.
    fn gateway(&self) -> Option<Ipv4Addr>;

    /// Address to publish host ports on.
    async fn host_ip(&self) -> Option<Ipv4Addr>;

    /// Next address not bound by a live member.
    async fn next_ip(&self) -> Option<Ipv4Addr>;

    /// Containers launched on this network.
    fn registry(&self) -> &NetworkRegistry;

    /// Record a started container so its siblings can find it.
    fn add_container(&self, info: OrchestratorInfo) -> Arc<OrchestratorInfo> {
        self.registry().add(info)
    }
}

/// [`Network`] backed by a network defined on the engine.
pub struct EngineNetwork<E: ?Sized> {
    engine: Arc<E>,
    resource: NetworkResource,
    range: Option<SubnetRange>,
    registry: NetworkRegistry,
}

impl<E: NetworkEngine + ?Sized> EngineNetwork<E> {
    /// Wrap an engine network. Address scans are only possible when the
    /// resource carries a subnet.
    #[must_use]
    pub fn new(engine: Arc<E>, resource: NetworkResource) -> Self {
        Self {
            engine,
            range: resource.subnet.map(SubnetRange::new),
            resource,
            registry: NetworkRegistry::new(),
        }
    }

    /// The network's address range.
    #[must_use]
    pub const fn subnet(&self) -> Option<Ipv4Cidr> {
        self.resource.subnet
    }

    /// Raw engine description.
    #[must_use]
    pub const fn resource(&self) -> &NetworkResource {
        &self.resource
    }

    async fn free_ip(&self) -> Option<Ipv4Addr> {
        let range = self.range.as_ref()?;

        while let Some(candidate) = range.next_ip() {
            if self.is_free(candidate).await {
                return Some(candidate);
            }
        }

        None
    }

    async fn is_free(&self, addr: Ipv4Addr) -> bool {
        match self.engine.network_members(&self.resource.id).await {
            Ok(members) => !members.contains(&addr),
            Err(e) => {
                tracing::warn!(network = %self.resource.name, addr = %addr, error = %e, "Failed to inspect network members");
                false
            }
        }
    }
}

#[async_trait]
impl<E: NetworkEngine + ?Sized> Network for EngineNetwork<E> {
    fn id(&self) -> &str {
        &self.resource.id
    }

    fn name(&self) -> &str {
        &self.resource.name
    }

    fn gateway(&self) -> Option<Ipv4Addr> {
        self.resource.gateway
    }

    async fn host_ip(&self) -> Option<Ipv4Addr> {
        self.free_ip().await
    }

    async fn next_ip(&self) -> Option<Ipv4Addr> {
        self.free_ip().await
    }

    fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }
}

impl<E: ?Sized> std::fmt::Debug for EngineNetwork<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineNetwork")
            .field("resource", &self.resource)
            .field("range", &self.range)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
