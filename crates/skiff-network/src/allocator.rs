//! Allocation of disjoint private subnets for isolated networks.
//!
//! The allocator carves `/24` subnets out of a supernet (by default
//! `172.16.0.0/12`), walking it one `/16` zone at a time. Before every
//! allocation the table of used ranges is refreshed from the engine, so
//! networks created by other tools are never handed out again. Refresh, scan
//! and reservation happen under one lock; another process racing us at the
//! engine level is not detected here and surfaces as a network creation
//! failure.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use skiff_common::{SkiffError, SkiffResult};
use tokio::sync::Mutex;

use crate::cidr::Ipv4Cidr;
use crate::engine::NetworkEngine;

const ZONE_PREFIX: u8 = 16;
const SUBNET_PREFIX: u8 = 24;

/// In-process allocator of non-overlapping subnets.
pub struct SubnetAllocator<E: ?Sized> {
    engine: Arc<E>,
    supernet: Ipv4Cidr,
    reserved: Vec<Ipv4Cidr>,
    used: Mutex<BTreeSet<Ipv4Cidr>>,
}

impl<E: NetworkEngine + ?Sized> SubnetAllocator<E> {
    /// Create an allocator over [`Ipv4Cidr::PRIVATE_172`].
    ///
    /// `reserved` ranges are never handed out, whatever the engine reports.
    pub fn new(engine: Arc<E>, reserved: impl IntoIterator<Item = Ipv4Cidr>) -> Self {
        let reserved: Vec<_> = reserved.into_iter().collect();

        Self {
            engine,
            supernet: Ipv4Cidr::PRIVATE_172,
            used: Mutex::new(reserved.iter().copied().collect()),
            reserved,
        }
    }

    /// Carve subnets out of `supernet` instead of the default block.
    #[must_use]
    pub fn with_supernet(mut self, supernet: Ipv4Cidr) -> Self {
        self.supernet = supernet;
        self
    }

    /// The block subnets are carved from.
    #[must_use]
    pub const fn supernet(&self) -> Ipv4Cidr {
        self.supernet
    }

    /// Ranges excluded at construction.
    #[must_use]
    pub fn reserved(&self) -> &[Ipv4Cidr] {
        &self.reserved
    }

    /// Reserve and return the lowest free `/24`.
    ///
    /// Returns `Ok(None)` when the supernet is exhausted.
    ///
    /// # Errors
    ///
    /// Fails only when the engine's network list cannot be read.
    pub async fn get_free_subnet(&self) -> SkiffResult<Option<Ipv4Cidr>> {
        let mut used = self.used.lock().await;

        let networks = self
            .engine
            .list_networks()
            .await
            .map_err(|source| SkiffError::Engine {
                operation: "list networks",
                name: self.supernet.to_string(),
                id: String::new(),
                source,
            })?;
        used.extend(networks.into_iter().filter_map(|n| n.subnet));

        for zone in self.zones() {
            if used
                .iter()
                .any(|u| u.prefix_len() <= ZONE_PREFIX && u.overlaps(&zone))
            {
                tracing::debug!(zone = %zone, "Zone fully reserved, skipping");
                continue;
            }

            if let Some(subnet) = subnets(zone).find(|s| !used.iter().any(|u| u.overlaps(s))) {
                used.insert(subnet);
                tracing::info!(subnet = %subnet, "Reserved subnet");
                return Ok(Some(subnet));
            }
        }

        tracing::warn!(supernet = %self.supernet, "No free subnet left");
        Ok(None)
    }

    /// Forget a subnet handed out earlier, once its network is gone.
    ///
    /// Reserved ranges stay reserved.
    pub async fn release(&self, subnet: Ipv4Cidr) {
        if self.reserved.contains(&subnet) {
            return;
        }

        if self.used.lock().await.remove(&subnet) {
            tracing::debug!(subnet = %subnet, "Released subnet");
        }
    }

    /// Snapshot of every range currently considered in use.
    pub async fn in_use(&self) -> Vec<Ipv4Cidr> {
        self.used.lock().await.iter().copied().collect()
    }

    fn zones(&self) -> impl Iterator<Item = Ipv4Cidr> + use<E> {
        let prefix = self.supernet.prefix_len().max(ZONE_PREFIX);
        blocks(self.supernet, prefix)
    }
}

/// `/24`s of a zone, skipping the one whose third octet is 255.
fn subnets(zone: Ipv4Cidr) -> impl Iterator<Item = Ipv4Cidr> {
    let candidates = if zone.prefix_len() <= SUBNET_PREFIX {
        Some(blocks(zone, SUBNET_PREFIX))
    } else {
        None
    };

    candidates
        .into_iter()
        .flatten()
        .filter(|s| s.network().octets()[2] != 255)
}

/// Split `net` into consecutive blocks of `prefix` length.
fn blocks(net: Ipv4Cidr, prefix: u8) -> impl Iterator<Item = Ipv4Cidr> {
    let start = u64::from(u32::from(net.network()));
    let step = 1u64 << (32 - u32::from(prefix));
    let count = net.size() / step;

    (0..count).filter_map(move |i| {
        let addr = u32::try_from(start + i * step).ok()?;
        Ipv4Cidr::new(Ipv4Addr::from(addr), prefix).ok()
    })
}
