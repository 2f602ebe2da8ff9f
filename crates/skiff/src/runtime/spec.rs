//! Container description consumed at creation.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skiff_common::{SkiffError, SkiffResult, TypeId};
use skiff_network::{Port, PortBind, PortBinds, PortName};

use super::config::START_TIMEOUT_FACTOR_VAR;

/// Symbolic name of the debugger port binding.
pub const DEBUG_PORT_NAME: &str = "debug";

/// Host port the debugger is published on.
pub const BASE_DEBUG_PORT: u16 = 40000;

/// Default time a container gets to become ready.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the container's program under a remote debugger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugPort {
    /// Container port the debugger listens on.
    pub port: u16,
    /// Program to debug.
    pub command: String,
}

impl DebugPort {
    /// Create a debug configuration.
    pub fn new(port: u16, command: impl Into<String>) -> Self {
        Self {
            port,
            command: command.into(),
        }
    }
}

impl fmt::Display for DebugPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.port)
    }
}

/// Everything needed to create one container.
///
/// Built by the caller and handed to the controller, which owns it from then
/// on. Only debug setup rewrites it, once, during creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Registry bucket siblings find this container under.
    pub type_id: TypeId,
    /// Image reference.
    pub image: String,
    /// Entrypoint override.
    pub entrypoint: Option<String>,
    /// Command.
    pub cmd: Vec<String>,
    /// `KEY=value` environment entries.
    pub env: Vec<String>,
    /// Bind mounts, `source:target[:options]`.
    pub mounts: Vec<String>,
    /// Named volumes.
    pub volumes: Vec<String>,
    /// Kernel parameters.
    pub sysctls: BTreeMap<String, String>,
    /// Published ports, in order.
    pub ports: PortBinds,
    /// Debugger setup, if enabled.
    pub debug_port: Option<DebugPort>,
    /// Time the container gets to become ready.
    pub start_timeout: Duration,
    /// Return from start once ready instead of supervising the process.
    pub background: bool,
    /// Remove the container once it stops.
    pub autoremove: bool,
    /// Fixed address inside the network.
    pub container_ip: Option<Ipv4Addr>,
}

impl ContainerSpec {
    /// Describe a container running `image`.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::default(),
            image: image.into(),
            entrypoint: None,
            cmd: Vec::new(),
            env: Vec::new(),
            mounts: Vec::new(),
            volumes: Vec::new(),
            sysctls: BTreeMap::from([("net.ipv4.ip_forward".to_string(), "1".to_string())]),
            ports: PortBinds::new(),
            debug_port: None,
            start_timeout: DEFAULT_START_TIMEOUT,
            background: false,
            autoremove: false,
            container_ip: None,
        }
    }

    /// Set the registry bucket.
    #[must_use]
    pub const fn with_type_id(mut self, type_id: TypeId) -> Self {
        self.type_id = type_id;
        self
    }

    /// Override the entrypoint.
    #[must_use]
    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    /// Set the command.
    #[must_use]
    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.env.push(format!("{key}={value}"));
        self
    }

    /// Add a bind mount.
    #[must_use]
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mounts.push(mount.into());
        self
    }

    /// Add a named volume.
    #[must_use]
    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volumes.push(volume.into());
        self
    }

    /// Set a kernel parameter.
    #[must_use]
    pub fn with_sysctl(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.sysctls.insert(key.into(), value.into());
        self
    }

    /// Publish a container port on `host` (`0` lets the engine pick).
    #[must_use]
    pub fn with_port(mut self, name: impl Into<PortName>, container: Port, host: u16) -> Self {
        self.ports.push(PortBind::new(name, container, host));
        self
    }

    /// Run under a debugger.
    #[must_use]
    pub fn with_debug_port(mut self, debug: DebugPort) -> Self {
        self.debug_port = Some(debug);
        self
    }

    /// Set the start timeout.
    #[must_use]
    pub const fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    /// Return from start as soon as the container is ready.
    #[must_use]
    pub const fn background(mut self) -> Self {
        self.background = true;
        self
    }

    /// Remove the container once it stops.
    #[must_use]
    pub const fn autoremove(mut self) -> Self {
        self.autoremove = true;
        self
    }

    /// Pin the container's address inside its network.
    #[must_use]
    pub const fn with_container_ip(mut self, ip: Ipv4Addr) -> Self {
        self.container_ip = Some(ip);
        self
    }

    /// Rewrite the spec to run under the debugger, if one is configured.
    ///
    /// Publishes the debugger port on [`BASE_DEBUG_PORT`], wraps the command
    /// and, when `timeout_factor` is given, multiplies the start timeout by it.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::Config`] when `timeout_factor` is not a positive
    /// integer. The rest of the rewrite still happens and the timeout is left
    /// untouched.
    pub fn apply_debug(&mut self, timeout_factor: Option<&str>) -> SkiffResult<()> {
        let Some(debug) = &self.debug_port else {
            return Ok(());
        };

        self.ports.push(PortBind::new(
            DEBUG_PORT_NAME,
            Port::tcp(debug.port),
            BASE_DEBUG_PORT,
        ));
        self.cmd = vec![
            "/bin/dlv".to_string(),
            format!("--listen=:{BASE_DEBUG_PORT}"),
            "--headless=true".to_string(),
            "--api-version=2".to_string(),
            "--accept-multiclient".to_string(),
            "exec".to_string(),
            debug.command.clone(),
        ];

        let Some(raw) = timeout_factor else {
            return Ok(());
        };

        let scaled = raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|factor| *factor > 0)
            .and_then(|factor| self.start_timeout.checked_mul(factor))
            .ok_or_else(|| SkiffError::Config {
                message: format!("wrong {START_TIMEOUT_FACTOR_VAR} value: '{raw}'"),
            })?;

        self.start_timeout = scaled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_spec() -> ContainerSpec {
        ContainerSpec::new("api", "registry.local/api:latest")
            .with_cmd(["/app"])
            .with_port("http", Port::tcp(8080), 0)
            .with_debug_port(DebugPort::new(4000, "/app"))
            .with_start_timeout(Duration::from_secs(10))
    }

    #[test]
    fn new_spec_enables_forwarding() {
        let spec = ContainerSpec::new("db", "postgres:16");
        assert_eq!(
            spec.sysctls.get("net.ipv4.ip_forward").map(String::as_str),
            Some("1")
        );
        assert_eq!(spec.start_timeout, DEFAULT_START_TIMEOUT);
    }

    #[test]
    fn debug_rewrites_command_and_ports() {
        let mut spec = debug_spec();
        spec.apply_debug(None).unwrap();

        assert_eq!(spec.cmd.len(), 7);
        assert_eq!(spec.cmd[0], "/bin/dlv");
        assert_eq!(spec.cmd[1], "--listen=:40000");
        assert_eq!(spec.cmd.last().map(String::as_str), Some("/app"));

        let bind = spec.ports.get(DEBUG_PORT_NAME).unwrap();
        assert_eq!(bind.container, Port::tcp(4000));
        assert_eq!(bind.host, BASE_DEBUG_PORT);
        assert_eq!(spec.ports.len(), 2);
        assert_eq!(spec.start_timeout, Duration::from_secs(10));
    }

    #[test]
    fn debug_scales_timeout() {
        let mut spec = debug_spec();
        spec.apply_debug(Some("3")).unwrap();
        assert_eq!(spec.start_timeout, Duration::from_secs(30));
    }

    #[test]
    fn bad_factor_keeps_timeout() {
        for raw in ["three", "-2", "0", ""] {
            let mut spec = debug_spec();
            let err = spec.apply_debug(Some(raw)).unwrap_err();

            assert!(matches!(err, SkiffError::Config { .. }));
            assert_eq!(spec.start_timeout, Duration::from_secs(10));
            assert_eq!(spec.cmd.len(), 7);
        }
    }

    #[test]
    fn no_debug_port_is_a_no_op() {
        let mut spec = ContainerSpec::new("db", "postgres:16").with_cmd(["postgres"]);
        spec.apply_debug(Some("5")).unwrap();

        assert_eq!(spec.cmd, vec!["postgres"]);
        assert!(spec.ports.is_empty());
        assert_eq!(spec.start_timeout, DEFAULT_START_TIMEOUT);
    }
}
