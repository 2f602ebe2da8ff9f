//! Container type and lifecycle operations.

use std::collections::HashMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use skiff_common::{ContainerId, SkiffError, SkiffResult};
use skiff_network::{
    AddrsMap, Network, OrchestratorInfo, Port, PortBinding, PortBinds, PortMap, PortName,
    join_host_port,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::config::RuntimeConfig;
use super::engine::{ContainerInfo, CreateRequest, EngineClient};
use super::events::{EventBus, LifecycleEvent};
use super::lifecycle::LifecycleState;
use super::log::{ContainerOutput, OutputStream, copy_logs};
use super::readiness::{ConstantDelay, ReadyProbe};
use super::spec::ContainerSpec;

/// Endpoint directories, written once when the container starts.
#[derive(Debug)]
struct Endpoints {
    container_ip: Option<Ipv4Addr>,
    host: AddrsMap,
    container: AddrsMap,
}

/// One container and everything needed to drive it through its life.
///
/// The controller creates the container, starts it, races its readiness
/// probe against process exit and the start deadline, then supervises it
/// until it exits or a stop is requested.
pub struct Container<C: ?Sized, N: ?Sized> {
    client: Arc<C>,
    network: Arc<N>,
    spec: ContainerSpec,
    config: RuntimeConfig,
    probe: Arc<dyn ReadyProbe>,
    output: ContainerOutput,
    events: Option<EventBus>,
    host_ip: Option<Ipv4Addr>,
    port_names: HashMap<String, PortName>,
    id: Option<ContainerId>,
    endpoints: OnceLock<Endpoints>,
    state: Mutex<LifecycleState>,
    stopped: Mutex<bool>,
}

impl<C, N> Container<C, N>
where
    C: EngineClient + ?Sized + 'static,
    N: Network + ?Sized,
{
    /// Describe a container on `network`. Nothing touches the engine until
    /// [`create_container`](Self::create_container).
    pub fn new(client: Arc<C>, network: Arc<N>, spec: ContainerSpec) -> Self {
        Self {
            client,
            network,
            spec,
            config: RuntimeConfig::default(),
            probe: Arc::new(ConstantDelay::default()),
            output: ContainerOutput::default(),
            events: None,
            host_ip: None,
            port_names: HashMap::new(),
            id: None,
            endpoints: OnceLock::new(),
            state: Mutex::new(LifecycleState::Uninitialized),
            stopped: Mutex::new(false),
        }
    }

    /// Set the runtime configuration.
    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default five second readiness delay.
    #[must_use]
    pub fn with_probe(mut self, probe: impl ReadyProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    /// Send the container's stdout and stderr to these streams.
    #[must_use]
    pub fn with_output(mut self, stdout: OutputStream, stderr: OutputStream) -> Self {
        self.output = ContainerOutput::new(Some(stdout), Some(stderr));
        self
    }

    /// Publish lifecycle events on `bus`.
    #[must_use]
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Engine ID, once created.
    #[must_use]
    pub const fn id(&self) -> Option<&ContainerId> {
        self.id.as_ref()
    }

    /// Image reference.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.spec.image
    }

    /// The container description, including debug adjustments once created.
    #[must_use]
    pub const fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// The network the container is attached to.
    #[must_use]
    pub const fn network(&self) -> &Arc<N> {
        &self.network
    }

    /// Host address published ports are bound on.
    #[must_use]
    pub fn host_ip(&self) -> Ipv4Addr {
        self.host_ip.unwrap_or(Ipv4Addr::LOCALHOST)
    }

    /// Address inside the network, once started.
    #[must_use]
    pub fn container_ip(&self) -> Option<Ipv4Addr> {
        self.endpoints.get().and_then(|e| e.container_ip)
    }

    /// Configured host port of a named binding.
    #[must_use]
    pub fn host_port(&self, name: &str) -> Option<u16> {
        self.spec.ports.get(name).map(|b| b.host)
    }

    /// Container side of every binding, in order.
    #[must_use]
    pub fn container_ports(&self) -> Vec<Port> {
        self.spec.ports.iter().map(|b| b.container).collect()
    }

    /// Host bindings to request from the engine.
    #[must_use]
    pub fn port_map(&self) -> PortMap {
        bind_ports(&self.spec.ports, self.host_ip())
    }

    /// Host-side endpoint directory, once started.
    #[must_use]
    pub fn host_addrs(&self) -> Option<&AddrsMap> {
        self.endpoints.get().map(|e| &e.host)
    }

    /// Container-side endpoint directory, once started.
    #[must_use]
    pub fn container_addrs(&self) -> Option<&AddrsMap> {
        self.endpoints.get().map(|e| &e.container)
    }

    /// Write a line to the container's stdout stream.
    pub fn log_stdout(&self, line: impl std::fmt::Display) -> bool {
        self.output.log_stdout(line)
    }

    /// Write a line to the container's stderr stream.
    pub fn log_stderr(&self, line: impl std::fmt::Display) -> bool {
        self.output.log_stderr(line)
    }

    /// Write an error to the container's stderr stream.
    pub fn log_error(&self, err: &dyn std::error::Error, context: Option<&str>) -> bool {
        self.output.log_error(err, context)
    }

    /// Configure and create the container on the engine.
    ///
    /// # Errors
    ///
    /// [`SkiffError::PortNameConflict`] when two bindings claim one port,
    /// [`SkiffError::ContainerCreate`] when the engine refuses.
    pub async fn create_container(&mut self) -> SkiffResult<()> {
        if self.id.is_some() {
            return Err(SkiffError::Internal {
                message: format!("container {} created twice", self.spec.name),
            });
        }

        // The spec is only replaced once the engine accepted it, so a retry
        // after a failed create starts from the caller's description.
        let mut spec = self.spec.clone();
        if let Err(e) = spec.apply_debug(self.config.start_timeout_factor.as_deref()) {
            tracing::warn!(container = %spec.name, error = %e, "Ignoring start timeout factor");
            self.output.log_stderr(&e);
        }
        spec.ports.validate()?;

        let host_ip = match self.host_ip {
            Some(ip) => ip,
            None => {
                let ip = self.network.host_ip().await.unwrap_or(Ipv4Addr::LOCALHOST);
                self.host_ip = Some(ip);
                ip
            }
        };

        let request = CreateRequest {
            spec: &spec,
            network: self.network.name(),
            port_map: bind_ports(&spec.ports, host_ip),
        };

        tracing::info!(container = %spec.name, image = %spec.image, "Creating container");
        let raw_id = self
            .client
            .create_container(&request)
            .await
            .map_err(|source| SkiffError::ContainerCreate {
                name: spec.name.clone(),
                source,
            })?;
        let id = self.accept_id(raw_id)?;
        tracing::debug!(container = %spec.name, container_id = %id.short(), "Container created");

        self.port_names = spec.ports.names();
        self.spec = spec;
        self.id = Some(id);
        *self.state.lock() = LifecycleState::Created;
        self.publish(|name, id, timestamp| LifecycleEvent::Created {
            name,
            id,
            timestamp,
        });

        Ok(())
    }

    /// Start the container and wait for it to become ready.
    ///
    /// Once ready, `ready` is notified. Unless the container runs in the
    /// background, the call then blocks until the process exits or `stop`
    /// resolves, returning the exit outcome or the result of [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// [`SkiffError::DidNotStart`] when the start timeout elapses first (the
    /// container is stopped), [`SkiffError::ExitedBeforeReady`] when the
    /// process exits first, [`SkiffError::Engine`] on engine failures.
    pub async fn start_container(
        &self,
        stop: impl Future<Output = ()>,
        ready: Option<oneshot::Sender<()>>,
    ) -> SkiffResult<()> {
        let id = self.created_id()?;
        let name = self.spec.name.as_str();

        if self.endpoints.get().is_some() {
            return Err(SkiffError::Internal {
                message: format!("container {name} started twice"),
            });
        }

        if let Some(debug) = &self.spec.debug_port {
            self.output
                .log_stdout(format_args!("\n!!! RUNNING IN DEBUG MODE!!! PORT: {debug}\n"));
        }

        *self.state.lock() = LifecycleState::Starting;
        tracing::info!(container = %name, container_id = %id.short(), "Starting container");

        let info = self
            .client
            .start_container(id.as_str(), name)
            .await
            .map_err(|source| {
                *self.state.lock() = LifecycleState::Failed;
                SkiffError::engine("start container", name, id, source)
            })?;

        let endpoints = self.build_endpoints(&info);
        let info_id = if info.id.is_empty() {
            id.to_string()
        } else {
            info.id
        };
        let registration = OrchestratorInfo {
            id: info_id,
            type_id: self.spec.type_id,
            container_endpoints: endpoints.container.clone(),
            host_endpoints: endpoints.host.clone(),
        };
        if self.endpoints.set(endpoints).is_err() {
            return Err(SkiffError::Internal {
                message: format!("container {name} started twice"),
            });
        }

        let log_cancel = CancellationToken::new();
        let _log_guard = log_cancel.clone().drop_guard();
        self.spawn_log_copy(id, log_cancel);

        self.network.add_container(registration);

        let mut exit = self.spawn_exit_wait(id);
        self.publish(|name, id, timestamp| LifecycleEvent::Started {
            name,
            id,
            timestamp,
        });

        let startup = CancellationToken::new();
        let startup_guard = startup.clone().drop_guard();
        let mut probe = self.probe.ready(startup);
        let deadline = tokio::time::sleep(self.spec.start_timeout);
        tokio::pin!(deadline);

        // Exit is polled first, so an exit outcome observed together with
        // readiness wins.
        tokio::select! {
            biased;

            _ = &mut exit => {
                *self.state.lock() = LifecycleState::ExitedBeforeReady;
                tracing::warn!(container = %name, container_id = %id.short(), "Container exited before ready");

                return Err(SkiffError::ExitedBeforeReady {
                    name: name.to_string(),
                    id: id.short().to_string(),
                });
            }
            Ok(()) = &mut probe => {}
            () = &mut deadline => {
                tracing::warn!(
                    container = %name,
                    container_id = %id.short(),
                    timeout = ?self.spec.start_timeout,
                    "Container did not become ready in time"
                );

                if let Err(e) = self.stop().await {
                    tracing::warn!(container = %name, error = %e, "Failed to stop container");
                    self.output.log_error(&e, Some("stop container"));
                }
                *self.state.lock() = LifecycleState::TimedOut;

                return Err(SkiffError::DidNotStart {
                    name: name.to_string(),
                    id: id.short().to_string(),
                });
            }
        }

        drop(startup_guard);
        *self.state.lock() = LifecycleState::Ready;
        tracing::info!(container = %name, container_id = %id.short(), "Container ready");

        let message = format!("{name} component ready");
        if !self.output.log_stdout(&message) {
            let _ = OutputStream::stdout().write_line(&message);
        }
        self.publish(|name, id, timestamp| LifecycleEvent::Ready {
            name,
            id,
            timestamp,
        });

        if let Some(ready) = ready {
            let _ = ready.send(());
        }

        *self.state.lock() = LifecycleState::Running;

        if self.spec.background {
            return Ok(());
        }

        tokio::pin!(stop);
        tokio::select! {
            biased;

            outcome = &mut exit => {
                *self.state.lock() = LifecycleState::Exited;
                outcome.unwrap_or_else(|_| {
                    Err(SkiffError::Internal {
                        message: format!("exit watcher of {name} dropped"),
                    })
                })
            }
            () = &mut stop => self.stop().await,
        }
    }

    /// Stop the container immediately.
    ///
    /// Only the first call reaches the engine; later calls fail with
    /// [`SkiffError::AlreadyStopped`].
    ///
    /// # Errors
    ///
    /// [`SkiffError::AlreadyStopped`] on repeated calls, [`SkiffError::Engine`]
    /// when the engine fails to stop it.
    pub async fn stop(&self) -> SkiffResult<()> {
        let id = self.created_id()?;

        {
            let mut stopped = self.stopped.lock();
            if *stopped {
                return Err(SkiffError::AlreadyStopped {
                    name: self.spec.name.clone(),
                    id: id.to_string(),
                });
            }
            *stopped = true;
        }

        *self.state.lock() = LifecycleState::Stopped;
        tracing::info!(container = %self.spec.name, container_id = %id.short(), "Stopping container");
        self.publish(|name, id, timestamp| LifecycleEvent::Stopped {
            name,
            id,
            timestamp,
        });

        self.client
            .stop_container(id.as_str(), Duration::ZERO)
            .await
            .map_err(|source| SkiffError::engine("stop container", &self.spec.name, id, source))
    }

    /// Wrap an engine-issued ID. The container already exists on the engine,
    /// so only an empty ID is refused.
    fn accept_id(&self, raw: String) -> SkiffResult<ContainerId> {
        if raw.is_empty() {
            return Err(SkiffError::Internal {
                message: format!("engine returned no id for container {}", self.spec.name),
            });
        }

        Ok(ContainerId::new(raw.as_str()).unwrap_or_else(|_| {
            tracing::warn!(container = %self.spec.name, container_id = %raw, "Engine issued an unusual container id");
            ContainerId::new_unchecked(raw)
        }))
    }

    fn created_id(&self) -> SkiffResult<&ContainerId> {
        self.id.as_ref().ok_or_else(|| SkiffError::NotCreated {
            name: self.spec.name.clone(),
        })
    }

    fn build_endpoints(&self, info: &ContainerInfo) -> Endpoints {
        let mut host = AddrsMap::new();
        for (port, bindings) in &info.port_bindings {
            let Some(binding) = bindings.first() else {
                continue;
            };
            let name = self
                .port_names
                .get(&port.number().to_string())
                .or_else(|| self.port_names.get(&binding.host_port));

            if let Some(name) = name {
                host.insert(name.clone(), join_host_port(self.host_ip(), &binding.host_port));
            }
        }

        let container_ip = info
            .ip_address
            .or_else(|| {
                info.networks
                    .get(self.network.name())
                    .and_then(|settings| settings.ip_address)
            })
            .or(self.spec.container_ip);

        let mut container = AddrsMap::new();
        if let Some(ip) = container_ip {
            for bind in &self.spec.ports {
                container.insert(bind.name.clone(), join_host_port(ip, bind.container.number()));
            }
        }

        tracing::debug!(
            container = %self.spec.name,
            ip = ?container_ip,
            host = host.len(),
            internal = container.len(),
            "Published endpoints"
        );

        Endpoints {
            container_ip,
            host,
            container,
        }
    }

    fn spawn_log_copy(&self, id: &ContainerId, cancel: CancellationToken) {
        let stream = self.client.logs(id.as_str(), self.config.log_follow);
        let output = self.output.clone();
        let name = self.spec.name.clone();

        tokio::spawn(async move {
            if let Err(e) = copy_logs(stream, &output, cancel).await {
                tracing::warn!(container = %name, error = %e, "Log stream failed");
                output.log_error(&e, Some("stream logs"));
            }
        });
    }

    fn spawn_exit_wait(&self, id: &ContainerId) -> oneshot::Receiver<SkiffResult<()>> {
        let (tx, rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let output = self.output.clone();
        let events = self.events.clone();
        let name = self.spec.name.clone();
        let id = id.clone();

        tokio::spawn(async move {
            let outcome = match client.wait_container(id.as_str()).await {
                Err(source) => Err(SkiffError::engine("wait container", &name, &id, source)),
                Ok(status) => {
                    tracing::info!(container = %name, container_id = %id.short(), code = status.code, "Container exited");
                    if let Some(events) = &events {
                        events.publish(LifecycleEvent::Exited {
                            name: name.clone(),
                            id: id.to_string(),
                            code: status.code,
                            timestamp: Utc::now(),
                        });
                    }

                    let success = status.success();
                    if let Some(message) = status.error {
                        output.log_stderr(format_args!(
                            "{} {message}",
                            console::style("ERROR:").red().bright()
                        ));
                        Err(SkiffError::ProcessExited {
                            name,
                            code: status.code,
                            message,
                        })
                    } else {
                        output.log_stdout(format_args!(
                            "container exited with status: {}",
                            status.code
                        ));
                        if success {
                            Ok(())
                        } else {
                            Err(SkiffError::ProcessExited {
                                name,
                                code: status.code,
                                message: String::new(),
                            })
                        }
                    }
                }
            };

            let _ = tx.send(outcome);
        });

        rx
    }

    fn publish(&self, event: impl FnOnce(String, String, DateTime<Utc>) -> LifecycleEvent) {
        if let (Some(bus), Some(id)) = (&self.events, self.id.as_ref()) {
            bus.publish(event(self.spec.name.clone(), id.to_string(), Utc::now()));
        }
    }
}

fn bind_ports(ports: &PortBinds, host_ip: Ipv4Addr) -> PortMap {
    ports
        .iter()
        .map(|b| {
            let binding = PortBinding::new(host_ip.to_string(), b.host.to_string());
            (b.container, vec![binding])
        })
        .collect()
}

impl<C: ?Sized, N: ?Sized> std::fmt::Debug for Container<C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.spec.name)
            .field("id", &self.id)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
