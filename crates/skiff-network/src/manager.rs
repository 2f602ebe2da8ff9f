//! Network setup for a group of containers.

use std::sync::Arc;

use dashmap::DashMap;
use skiff_common::{EngineError, SkiffError, SkiffResult};

use crate::allocator::SubnetAllocator;
use crate::cidr::Ipv4Cidr;
use crate::engine::NetworkEngine;
use crate::network::EngineNetwork;

/// Creates, reuses and removes engine networks.
pub struct NetworkManager<E: ?Sized> {
    engine: Arc<E>,
    allocator: SubnetAllocator<E>,
    networks: DashMap<String, Arc<EngineNetwork<E>>>,
}

impl<E: NetworkEngine + ?Sized> NetworkManager<E> {
    /// Create a manager allocating subnets with `allocator`.
    pub fn new(engine: Arc<E>, allocator: SubnetAllocator<E>) -> Self {
        Self {
            engine,
            allocator,
            networks: DashMap::new(),
        }
    }

    /// The subnet allocator.
    #[must_use]
    pub const fn allocator(&self) -> &SubnetAllocator<E> {
        &self.allocator
    }

    /// A network set up earlier through this manager.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<EngineNetwork<E>>> {
        self.networks.get(name).map(|n| Arc::clone(n.value()))
    }

    /// Return the network called `name`, creating it if the engine does not
    /// know it yet.
    ///
    /// Without an explicit `cidr` a free subnet is taken from the allocator.
    ///
    /// # Errors
    ///
    /// [`SkiffError::SubnetsExhausted`] when no subnet is left, or
    /// [`SkiffError::Engine`] when the engine refuses.
    pub async fn ensure(
        &self,
        name: &str,
        cidr: Option<Ipv4Cidr>,
    ) -> SkiffResult<Arc<EngineNetwork<E>>> {
        if let Some(network) = self.get(name) {
            return Ok(network);
        }

        let existing = self
            .engine
            .list_networks()
            .await
            .map_err(|source| engine_error("list networks", name, "", source))?
            .into_iter()
            .find(|n| n.name == name);

        let resource = if let Some(resource) = existing {
            tracing::debug!(network = %name, id = %resource.id, "Reusing network");
            resource
        } else {
            let subnet = match cidr {
                Some(cidr) => cidr,
                None => self
                    .allocator
                    .get_free_subnet()
                    .await?
                    .ok_or_else(|| SkiffError::SubnetsExhausted {
                        supernet: self.allocator.supernet().to_string(),
                    })?,
            };

            tracing::info!(network = %name, subnet = %subnet, "Creating network");
            match self.engine.create_network(name, Some(subnet)).await {
                Ok(resource) => resource,
                Err(source) => {
                    if cidr.is_none() {
                        self.allocator.release(subnet).await;
                    }
                    return Err(engine_error("create network", name, "", source));
                }
            }
        };

        let network = Arc::new(EngineNetwork::new(Arc::clone(&self.engine), resource));
        self.networks.insert(name.to_string(), Arc::clone(&network));

        Ok(network)
    }

    /// Remove a network and hand its subnet back to the allocator.
    ///
    /// Networks not set up through this manager are left alone.
    ///
    /// # Errors
    ///
    /// [`SkiffError::Engine`] when the engine fails to delete it.
    pub async fn remove(&self, name: &str) -> SkiffResult<()> {
        let Some((_, network)) = self.networks.remove(name) else {
            return Ok(());
        };

        let resource = network.resource();
        tracing::info!(network = %name, id = %resource.id, "Deleting network");

        self.engine
            .remove_network(&resource.id)
            .await
            .map_err(|source| engine_error("remove network", name, &resource.id, source))?;

        if let Some(subnet) = resource.subnet {
            self.allocator.release(subnet).await;
        }

        Ok(())
    }
}

fn engine_error(
    operation: &'static str,
    name: &str,
    id: &str,
    source: EngineError,
) -> SkiffError {
    SkiffError::Engine {
        operation,
        name: name.to_string(),
        id: id.to_string(),
        source,
    }
}
