//! # skiff-network
//!
//! Network layer of the Skiff harness.
//!
//! This crate provides the pieces shared by the lifecycle controller and the
//! network setup code:
//!
//! - [`SubnetAllocator`] hands out disjoint private `/24` subnets
//! - [`Network`] and its engine-backed [`EngineNetwork`] assign addresses and
//!   record launched containers in a [`NetworkRegistry`]
//! - [`PortBinds`] and [`AddrsMap`] describe published ports and the endpoint
//!   directories built from them

#![warn(missing_docs)]

pub mod allocator;
pub mod cidr;
pub mod endpoint;
pub mod engine;
pub mod manager;
pub mod network;
pub mod ports;
pub mod range;
pub mod registry;

pub use allocator::SubnetAllocator;
pub use cidr::Ipv4Cidr;
pub use endpoint::{AddrsMap, OrchestratorInfo, join_host_port};
pub use engine::{NetworkEngine, NetworkResource};
pub use manager::NetworkManager;
pub use network::{EngineNetwork, Network};
pub use ports::{Port, PortBind, PortBinding, PortBinds, PortMap, PortName, Protocol};
pub use range::SubnetRange;
pub use registry::NetworkRegistry;
