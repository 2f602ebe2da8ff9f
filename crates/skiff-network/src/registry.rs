//! Per-network record of launched containers, bucketed by type.

use std::sync::Arc;

use parking_lot::RwLock;
use skiff_common::TypeId;

use crate::endpoint::OrchestratorInfo;

const BUCKETS: usize = TypeId::MAX as usize;

/// Containers registered on one network, grouped by [`TypeId`].
#[derive(Debug)]
pub struct NetworkRegistry {
    buckets: RwLock<[Vec<Arc<OrchestratorInfo>>; BUCKETS]>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self {
            buckets: RwLock::new(std::array::from_fn(|_| Vec::new())),
        }
    }
}

impl NetworkRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a container.
    pub fn add(&self, info: OrchestratorInfo) -> Arc<OrchestratorInfo> {
        let info = Arc::new(info);
        tracing::debug!(container_id = %info.id, type_id = %info.type_id, "Registering container");

        self.buckets.write()[info.type_id.index()].push(Arc::clone(&info));
        info
    }

    /// Containers of one type, in registration order.
    #[must_use]
    pub fn by_type(&self, type_id: TypeId) -> Vec<Arc<OrchestratorInfo>> {
        self.buckets.read()[type_id.index()].clone()
    }

    /// Every registered container, grouped by ascending type.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<OrchestratorInfo>> {
        self.buckets.read().iter().flatten().cloned().collect()
    }

    /// Number of registered containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.read().iter().map(Vec::len).sum()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
