//! In-memory network engine shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use skiff_common::EngineError;
use skiff_network::{Ipv4Cidr, NetworkEngine, NetworkResource};

#[derive(Default)]
pub struct FakeNetworkEngine {
    networks: Mutex<Vec<NetworkResource>>,
    members: Mutex<HashMap<String, Vec<Ipv4Addr>>>,
    pub creates: AtomicUsize,
    pub removes: AtomicUsize,
    pub fail_create: Mutex<Option<EngineError>>,
}

impl FakeNetworkEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend another tool already defined a network.
    pub fn with_network(self, name: &str, subnet: &str) -> Self {
        self.networks.lock().push(NetworkResource {
            id: format!("ext-{name}"),
            name: name.to_string(),
            subnet: Some(subnet.parse().unwrap()),
            gateway: None,
        });
        self
    }

    pub fn add_member(&self, network_id: &str, addr: Ipv4Addr) {
        self.members
            .lock()
            .entry(network_id.to_string())
            .or_default()
            .push(addr);
    }

    pub fn network_names(&self) -> Vec<String> {
        self.networks.lock().iter().map(|n| n.name.clone()).collect()
    }
}

#[async_trait]
impl NetworkEngine for FakeNetworkEngine {
    async fn list_networks(&self) -> Result<Vec<NetworkResource>, EngineError> {
        Ok(self.networks.lock().clone())
    }

    async fn create_network(
        &self,
        name: &str,
        subnet: Option<Ipv4Cidr>,
    ) -> Result<NetworkResource, EngineError> {
        if let Some(err) = self.fail_create.lock().clone() {
            return Err(err);
        }

        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        let resource = NetworkResource {
            id: format!("net-{n}"),
            name: name.to_string(),
            subnet,
            gateway: subnet.map(|s| Ipv4Addr::from(u32::from(s.network()) + 1)),
        };
        self.networks.lock().push(resource.clone());

        Ok(resource)
    }

    async fn remove_network(&self, id: &str) -> Result<(), EngineError> {
        let mut networks = self.networks.lock();
        let before = networks.len();
        networks.retain(|n| n.id != id);

        if networks.len() == before {
            return Err(EngineError::not_found(format!("network {id}")));
        }

        self.removes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn network_members(&self, id: &str) -> Result<Vec<Ipv4Addr>, EngineError> {
        Ok(self.members.lock().get(id).cloned().unwrap_or_default())
    }
}
