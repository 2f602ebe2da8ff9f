//! In-memory engine and network for lifecycle tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use skiff::ImageBuildData;
use skiff::runtime::{
    ContainerInfo, CreateRequest, EndpointSettings, EngineClient, ExitStatus, LogChunk, LogStream,
    OutputStream,
};
use skiff_common::EngineError;
use skiff_network::{
    Ipv4Cidr, Network, NetworkEngine, NetworkRegistry, NetworkResource, PortBinding, PortMap,
};
use tokio::sync::{Notify, watch};

pub const CONTAINER_ID: &str = "0123456789abcdef0123456789abcdef";
pub const SHORT_ID: &str = "0123456789ab";

/// What the engine was asked to create.
#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub name: String,
    pub cmd: Vec<String>,
    pub port_map: PortMap,
    pub network: String,
    pub container_ip: Option<Ipv4Addr>,
}

pub struct FakeEngine {
    pub created: Mutex<Vec<CreatedContainer>>,
    pub engine_id: Mutex<String>,
    pub create_error: Mutex<Option<EngineError>>,
    pub start_error: Mutex<Option<EngineError>>,
    pub stop_error: Mutex<Option<EngineError>>,
    pub container_ip: Mutex<Option<Ipv4Addr>>,
    pub network_ips: Mutex<HashMap<String, Ipv4Addr>>,
    pub log_chunks: Mutex<Vec<Result<LogChunk, EngineError>>>,
    pub stops: AtomicUsize,
    pub logs_closed: Arc<Notify>,
    pub images: Mutex<Vec<String>>,
    pub pulls: Mutex<Vec<String>>,
    pub builds: Mutex<Vec<Vec<String>>>,
    pub removed: Mutex<Vec<String>>,
    exit: watch::Sender<Option<ExitStatus>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            created: Mutex::default(),
            engine_id: Mutex::new(CONTAINER_ID.to_string()),
            create_error: Mutex::default(),
            start_error: Mutex::default(),
            stop_error: Mutex::default(),
            container_ip: Mutex::new(Some(Ipv4Addr::new(172, 16, 0, 3))),
            network_ips: Mutex::default(),
            log_chunks: Mutex::default(),
            stops: AtomicUsize::new(0),
            logs_closed: Arc::new(Notify::new()),
            images: Mutex::default(),
            pulls: Mutex::default(),
            builds: Mutex::default(),
            removed: Mutex::default(),
            exit: watch::channel(None).0,
        }
    }
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the container process exit.
    pub fn exit(&self, code: i64) {
        self.exit.send_replace(Some(ExitStatus { code, error: None }));
    }

    pub fn exit_with_error(&self, code: i64, error: &str) {
        self.exit.send_replace(Some(ExitStatus {
            code,
            error: Some(error.to_string()),
        }));
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn last_created(&self) -> CreatedContainer {
        self.created.lock().last().cloned().unwrap()
    }
}

#[async_trait]
impl NetworkEngine for FakeEngine {
    async fn list_networks(&self) -> Result<Vec<NetworkResource>, EngineError> {
        Ok(Vec::new())
    }

    async fn create_network(
        &self,
        name: &str,
        subnet: Option<Ipv4Cidr>,
    ) -> Result<NetworkResource, EngineError> {
        Ok(NetworkResource {
            id: format!("id-{name}"),
            name: name.to_string(),
            subnet,
            gateway: None,
        })
    }

    async fn remove_network(&self, _id: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn network_members(&self, _id: &str) -> Result<Vec<Ipv4Addr>, EngineError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl EngineClient for FakeEngine {
    async fn create_container(&self, request: &CreateRequest<'_>) -> Result<String, EngineError> {
        if let Some(err) = self.create_error.lock().clone() {
            return Err(err);
        }

        self.created.lock().push(CreatedContainer {
            name: request.spec.name.clone(),
            cmd: request.spec.cmd.clone(),
            port_map: request.port_map.clone(),
            network: request.network.to_string(),
            container_ip: request.spec.container_ip,
        });

        Ok(self.engine_id.lock().clone())
    }

    async fn start_container(&self, id: &str, _name: &str) -> Result<ContainerInfo, EngineError> {
        if let Some(err) = self.start_error.lock().clone() {
            return Err(err);
        }

        // Engine-assigned host ports come back as 30000 + container port.
        let port_bindings = self
            .created
            .lock()
            .last()
            .map(|c| c.port_map.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|(port, bindings)| {
                let bindings = bindings
                    .into_iter()
                    .map(|b| {
                        let host_port = if b.host_port == "0" {
                            (30000 + u32::from(port.number())).to_string()
                        } else {
                            b.host_port
                        };
                        PortBinding::new(b.host_ip, host_port)
                    })
                    .collect();
                (port, bindings)
            })
            .collect();

        let networks = self
            .network_ips
            .lock()
            .iter()
            .map(|(name, ip)| {
                (
                    name.clone(),
                    EndpointSettings {
                        ip_address: Some(*ip),
                    },
                )
            })
            .collect();

        Ok(ContainerInfo {
            id: id.to_string(),
            ip_address: *self.container_ip.lock(),
            port_bindings,
            networks,
        })
    }

    async fn wait_container(&self, _id: &str) -> Result<ExitStatus, EngineError> {
        let mut rx = self.exit.subscribe();
        let status = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| EngineError::stream("engine gone"))?;

        Ok(status.clone().unwrap_or_default())
    }

    async fn stop_container(&self, _id: &str, grace: Duration) -> Result<(), EngineError> {
        assert_eq!(grace, Duration::ZERO);
        self.stops.fetch_add(1, Ordering::SeqCst);

        match self.stop_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn logs(&self, _id: &str, follow: bool) -> LogStream {
        let chunks: Vec<_> = self.log_chunks.lock().drain(..).collect();
        let closed = CloseSignal(Arc::clone(&self.logs_closed));

        let stream = futures::stream::iter(chunks);
        if follow {
            Box::pin(stream.chain(futures::stream::pending()).map(move |chunk| {
                let _held = &closed;
                chunk
            }))
        } else {
            Box::pin(stream.map(move |chunk| {
                let _held = &closed;
                chunk
            }))
        }
    }

    async fn image_exists(&self, image: &str) -> Result<bool, EngineError> {
        Ok(self.images.lock().iter().any(|i| i == image))
    }

    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        self.pulls.lock().push(image.to_string());
        self.images.lock().push(image.to_string());
        Ok(())
    }

    async fn build_image(&self, data: &ImageBuildData) -> Result<(), EngineError> {
        self.builds.lock().push(data.tags.clone());
        self.images.lock().extend(data.tags.iter().cloned());
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> Result<(), EngineError> {
        let mut images = self.images.lock();
        let before = images.len();
        images.retain(|i| i != image);

        if images.len() == before {
            return Err(EngineError::not_found(format!("image {image}")));
        }

        self.removed.lock().push(image.to_string());
        Ok(())
    }
}

/// Notifies when the log stream holding it is dropped.
struct CloseSignal(Arc<Notify>);

impl Drop for CloseSignal {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

pub struct FakeNetwork {
    pub host_ip: Option<Ipv4Addr>,
    pub host_ip_calls: AtomicUsize,
    registry: NetworkRegistry,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Self::with_host_ip(Some(Ipv4Addr::new(10, 0, 0, 1)))
    }

    pub fn with_host_ip(host_ip: Option<Ipv4Addr>) -> Arc<Self> {
        Arc::new(Self {
            host_ip,
            host_ip_calls: AtomicUsize::new(0),
            registry: NetworkRegistry::new(),
        })
    }
}

#[async_trait]
impl Network for FakeNetwork {
    fn id(&self) -> &str {
        "net-1"
    }

    fn name(&self) -> &str {
        "itest"
    }

    fn gateway(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(172, 16, 0, 1))
    }

    async fn host_ip(&self) -> Option<Ipv4Addr> {
        self.host_ip_calls.fetch_add(1, Ordering::SeqCst);
        self.host_ip
    }

    async fn next_ip(&self) -> Option<Ipv4Addr> {
        None
    }

    fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }
}

/// Writer collecting everything written to it.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn stream(&self) -> OutputStream {
        OutputStream::new(self.clone())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn stdout_chunk(text: &'static str) -> Result<LogChunk, EngineError> {
    Ok(LogChunk::Stdout(Bytes::from_static(text.as_bytes())))
}
