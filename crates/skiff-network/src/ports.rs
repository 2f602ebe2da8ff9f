//! Port bindings between the host and a container.
//!
//! A container publishes an ordered list of [`PortBind`]s. Each binding gives a
//! container port a symbolic [`PortName`] so peers can look endpoints up by
//! name instead of by number.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skiff_common::{SkiffError, SkiffResult};

/// Protocol for port mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// TCP protocol.
    #[default]
    Tcp,
    /// UDP protocol.
    Udp,
}

impl Protocol {
    /// Get the protocol string used in port specifications.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A container port with its protocol, written `"80/tcp"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Port {
    number: u16,
    protocol: Protocol,
}

impl Port {
    /// Create a port.
    #[must_use]
    pub const fn new(number: u16, protocol: Protocol) -> Self {
        Self { number, protocol }
    }

    /// Create a TCP port.
    #[must_use]
    pub const fn tcp(number: u16) -> Self {
        Self::new(number, Protocol::Tcp)
    }

    /// Create a UDP port.
    #[must_use]
    pub const fn udp(number: u16) -> Self {
        Self::new(number, Protocol::Udp)
    }

    /// Port number.
    #[must_use]
    pub const fn number(&self) -> u16 {
        self.number
    }

    /// Port protocol.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

impl FromStr for Port {
    type Err = SkiffError;

    /// Parses `"80/tcp"`, `"53/udp"` and bare `"80"` (TCP).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SkiffError::InvalidPort {
            value: s.to_string(),
        };

        let (number, protocol) = match s.split_once('/') {
            Some((number, "" | "tcp")) => (number, Protocol::Tcp),
            Some((number, "udp")) => (number, Protocol::Udp),
            Some(_) => return Err(invalid()),
            None => (s, Protocol::Tcp),
        };

        let number = number.parse().map_err(|_| invalid())?;
        Ok(Self::new(number, protocol))
    }
}

impl TryFrom<String> for Port {
    type Error = SkiffError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Port> for String {
    fn from(port: Port) -> Self {
        port.to_string()
    }
}

/// Symbolic name of a published port, e.g. `"http"` or `"grpc"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortName(String);

impl PortName {
    /// Create a port name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PortName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for PortName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One published port of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBind {
    /// Symbolic name.
    pub name: PortName,
    /// Port inside the container.
    pub container: Port,
    /// Port on the host. `0` lets the engine pick one.
    pub host: u16,
}

impl PortBind {
    /// Create a port binding.
    pub fn new(name: impl Into<PortName>, container: Port, host: u16) -> Self {
        Self {
            name: name.into(),
            container,
            host,
        }
    }
}

/// Ordered port bindings of one container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortBinds(Vec<PortBind>);

impl PortBinds {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a binding.
    pub fn push(&mut self, bind: PortBind) {
        self.0.push(bind);
    }

    /// Iterate over the bindings in order.
    pub fn iter(&self) -> std::slice::Iter<'_, PortBind> {
        self.0.iter()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Find a binding by symbolic name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PortBind> {
        self.0.iter().find(|b| b.name.as_str() == name)
    }

    /// Map both the container port and the host port (as decimal strings) to
    /// the symbolic name of their binding.
    ///
    /// Engine-assigned host ports (`0`) are not indexed.
    #[must_use]
    pub fn names(&self) -> HashMap<String, PortName> {
        let mut names = HashMap::with_capacity(self.0.len() * 2);

        for bind in &self.0 {
            for key in Self::keys(bind) {
                names.insert(key, bind.name.clone());
            }
        }

        names
    }

    /// Check that no port value is claimed by two different names.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::PortNameConflict`] for the first clash found.
    pub fn validate(&self) -> SkiffResult<()> {
        let mut seen: HashMap<String, &PortName> = HashMap::new();

        for bind in &self.0 {
            for key in Self::keys(bind) {
                match seen.get(&key) {
                    Some(first) if **first != bind.name => {
                        return Err(SkiffError::PortNameConflict {
                            port: key,
                            first: first.to_string(),
                            second: bind.name.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(key, &bind.name);
                    }
                }
            }
        }

        Ok(())
    }

    fn keys(bind: &PortBind) -> impl Iterator<Item = String> + use<> {
        let host = (bind.host != 0).then(|| bind.host.to_string());
        std::iter::once(bind.container.number().to_string()).chain(host)
    }
}

impl From<Vec<PortBind>> for PortBinds {
    fn from(binds: Vec<PortBind>) -> Self {
        Self(binds)
    }
}

impl FromIterator<PortBind> for PortBinds {
    fn from_iter<T: IntoIterator<Item = PortBind>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PortBinds {
    type Item = &'a PortBind;
    type IntoIter = std::slice::Iter<'a, PortBind>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A host-side binding of a container port, as the engine reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Host IP the port is bound on.
    pub host_ip: String,
    /// Host port, as a decimal string.
    pub host_port: String,
}

impl PortBinding {
    /// Create a host binding.
    pub fn new(host_ip: impl Into<String>, host_port: impl Into<String>) -> Self {
        Self {
            host_ip: host_ip.into(),
            host_port: host_port.into(),
        }
    }
}

/// Container port to host bindings.
pub type PortMap = BTreeMap<Port, Vec<PortBinding>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_parsing() {
        assert_eq!("80/tcp".parse::<Port>().unwrap(), Port::tcp(80));
        assert_eq!("53/udp".parse::<Port>().unwrap(), Port::udp(53));
        assert_eq!("8080".parse::<Port>().unwrap(), Port::tcp(8080));
        assert_eq!("9000/".parse::<Port>().unwrap(), Port::tcp(9000));
        assert!("http/tcp".parse::<Port>().is_err());
        assert!("80/sctp".parse::<Port>().is_err());
        assert!("70000".parse::<Port>().is_err());
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(format!("{}", Protocol::Tcp), "tcp");
        assert_eq!(format!("{}", Protocol::Udp), "udp");
        assert_eq!(Port::udp(5353).to_string(), "5353/udp");
    }

    #[test]
    fn names_index_both_sides() {
        let binds = PortBinds::from(vec![PortBind::new("http", "80/tcp".parse().unwrap(), 8080)]);
        let names = binds.names();

        assert_eq!(names.len(), 2);
        assert_eq!(names["80"], PortName::from("http"));
        assert_eq!(names["8080"], PortName::from("http"));
    }

    #[test]
    fn names_skip_engine_assigned_host_ports() {
        let binds = PortBinds::from(vec![
            PortBind::new("http", Port::tcp(80), 0),
            PortBind::new("metrics", Port::tcp(9090), 0),
        ]);

        assert!(binds.validate().is_ok());
        assert!(!binds.names().contains_key("0"));
    }

    #[test]
    fn validate_rejects_shared_port_values() {
        let binds = PortBinds::from(vec![
            PortBind::new("http", Port::tcp(80), 8080),
            PortBind::new("admin", Port::tcp(8080), 9000),
        ]);

        match binds.validate() {
            Err(SkiffError::PortNameConflict {
                port,
                first,
                second,
            }) => {
                assert_eq!(port, "8080");
                assert_eq!(first, "http");
                assert_eq!(second, "admin");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn validate_allows_same_name_on_both_sides() {
        let binds = PortBinds::from(vec![PortBind::new("dns", Port::udp(53), 53)]);
        assert!(binds.validate().is_ok());
    }

    #[test]
    fn lookup_by_name() {
        let binds = PortBinds::from(vec![
            PortBind::new("http", Port::tcp(80), 8080),
            PortBind::new("grpc", Port::tcp(50051), 50051),
        ]);

        assert_eq!(binds.get("grpc").map(|b| b.host), Some(50051));
        assert!(binds.get("ws").is_none());
    }
}
