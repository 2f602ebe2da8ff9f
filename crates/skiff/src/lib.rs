//! # Skiff
//!
//! Ephemeral, network-isolated containers for integration test harnesses.
//!
//! Skiff creates a container on an engine, starts it, waits until it is
//! ready (or fails fast when it exits or misses its start deadline) and
//! supervises it until it exits or is asked to stop. Sibling containers on a
//! network find each other through the network's registry.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use skiff::runtime::{Container, ContainerSpec, EngineClient, HttpProbe, RuntimeConfig};
//! use skiff_network::{NetworkManager, Port, SubnetAllocator};
//!
//! # async fn example<E: EngineClient + 'static>(engine: Arc<E>) -> skiff_common::SkiffResult<()> {
//! let config = RuntimeConfig::from_env()?;
//! let allocator = SubnetAllocator::new(Arc::clone(&engine), config.reserved_networks.clone());
//! let networks = NetworkManager::new(Arc::clone(&engine), allocator);
//! let network = networks.ensure("itest", None).await?;
//!
//! let spec = ContainerSpec::new("api", "registry.local/api:latest")
//!     .with_port("http", Port::tcp(8080), 18080)
//!     .background();
//! let mut api = Container::new(engine, network, spec)
//!     .with_config(config)
//!     .with_probe(HttpProbe::new("http://127.0.0.1:18080/health"));
//!
//! api.create_container().await?;
//! api.start_container(std::future::pending(), None).await?;
//! api.stop().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod image;
pub mod runtime;

pub use image::{ImageBuildData, ImagePlan, ensure_images};
pub use runtime::Container;
