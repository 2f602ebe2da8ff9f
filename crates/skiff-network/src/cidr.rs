//! IPv4 network ranges in CIDR notation.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use skiff_common::{SkiffError, SkiffResult};

/// An IPv4 network, always normalized to its network address.
///
/// `"172.16.5.9/12"` parses to `172.16.0.0/12`, matching how engines report
/// the subnets they manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// `172.16.0.0/12`, the private block subnets are carved from by default.
    pub const PRIVATE_172: Self = Self {
        network: Ipv4Addr::new(172, 16, 0, 0),
        prefix: 12,
    };

    /// Create a network from any address inside it and a prefix length.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::InvalidCidr`] when `prefix > 32`.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> SkiffResult<Self> {
        if prefix > 32 {
            return Err(SkiffError::InvalidCidr {
                value: format!("{addr}/{prefix}"),
            });
        }

        Ok(Self {
            network: Ipv4Addr::from(u32::from(addr) & mask_bits(prefix)),
            prefix,
        })
    }

    /// Network address.
    #[must_use]
    pub const fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Prefix length.
    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        self.prefix
    }

    /// Last address of the range.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network) | !mask_bits(self.prefix))
    }

    /// Number of addresses covered.
    #[must_use]
    pub const fn size(&self) -> u64 {
        1u64 << (32 - self.prefix as u32)
    }

    /// Whether `addr` falls inside this network.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask_bits(self.prefix) == u32::from(self.network)
    }

    /// Whether the two ranges share at least one address.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let mask = mask_bits(self.prefix.min(other.prefix));
        u32::from(self.network) & mask == u32::from(other.network) & mask
    }

    /// Every address of the range in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        (u32::from(self.network)..=u32::from(self.broadcast())).map(Ipv4Addr::from)
    }
}

const fn mask_bits(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix as u32)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = SkiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SkiffError::InvalidCidr {
            value: s.to_string(),
        };

        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;

        Self::new(addr, prefix).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = SkiffError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.to_string()
    }
}
