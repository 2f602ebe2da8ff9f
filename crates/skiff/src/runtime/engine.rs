//! Container side of the engine API.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use skiff_common::EngineError;
use skiff_network::{NetworkEngine, PortMap};

use super::spec::ContainerSpec;

/// Output of a container, frame by frame.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<LogChunk, EngineError>> + Send>>;

/// One frame of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChunk {
    /// Written to stdout.
    Stdout(Bytes),
    /// Written to stderr.
    Stderr(Bytes),
}

/// What the engine needs to create a container.
#[derive(Debug, Clone)]
pub struct CreateRequest<'a> {
    /// The (debug-adjusted) container description.
    pub spec: &'a ContainerSpec,
    /// Network to attach to.
    pub network: &'a str,
    /// Host bindings to publish.
    pub port_map: PortMap,
}

/// Per-network settings of a started container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSettings {
    /// Address inside that network.
    pub ip_address: Option<Ipv4Addr>,
}

/// What the engine reports once a container is started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Container ID.
    pub id: String,
    /// Primary address, if the engine reports one.
    pub ip_address: Option<Ipv4Addr>,
    /// Published ports.
    pub port_bindings: PortMap,
    /// Settings per attached network, by network name.
    pub networks: HashMap<String, EndpointSettings>,
}

/// How a container process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code.
    pub code: i64,
    /// Error the engine attached to the status.
    pub error: Option<String>,
}

impl ExitStatus {
    /// Whether the process exited cleanly.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0 && self.error.is_none()
    }
}

/// Container operations a container engine backend must provide.
#[async_trait]
pub trait EngineClient: NetworkEngine {
    /// Create a container, returning its ID.
    async fn create_container(&self, request: &CreateRequest<'_>) -> Result<String, EngineError>;

    /// Start a created container.
    async fn start_container(&self, id: &str, name: &str) -> Result<ContainerInfo, EngineError>;

    /// Wait until the container process exits.
    async fn wait_container(&self, id: &str) -> Result<ExitStatus, EngineError>;

    /// Stop a container, killing it after `grace`.
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), EngineError>;

    /// Stream the container's output.
    fn logs(&self, id: &str, follow: bool) -> LogStream;

    /// Whether an image is present locally.
    async fn image_exists(&self, image: &str) -> Result<bool, EngineError>;

    /// Pull an image.
    async fn pull_image(&self, image: &str) -> Result<(), EngineError>;

    /// Build an image.
    async fn build_image(&self, data: &crate::image::ImageBuildData) -> Result<(), EngineError>;

    /// Remove an image from the local store.
    async fn remove_image(&self, image: &str) -> Result<(), EngineError>;
}
