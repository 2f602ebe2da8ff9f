//! Sequential address cursor over a bound subnet.

use std::fmt;
use std::net::Ipv4Addr;

use parking_lot::Mutex;

use crate::cidr::Ipv4Cidr;

type AddrFilter = Box<dyn Fn(Ipv4Addr) -> bool + Send + Sync>;
type Cursor = Box<dyn Iterator<Item = Ipv4Addr> + Send>;

/// Hands out the addresses of a subnet one by one, in ascending order.
///
/// By default only addresses whose last octet lies strictly between 2 and 254
/// are produced, leaving room for the gateway and the broadcast address.
pub struct SubnetRange {
    subnet: Ipv4Cidr,
    cursor: Mutex<Cursor>,
    filter: AddrFilter,
}

impl SubnetRange {
    /// Create a cursor positioned at the start of `subnet`.
    #[must_use]
    pub fn new(subnet: Ipv4Cidr) -> Self {
        Self {
            subnet,
            cursor: Mutex::new(Box::new(subnet.addresses())),
            filter: Box::new(default_filter),
        }
    }

    /// Replace the address filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(Ipv4Addr) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// The subnet being walked.
    #[must_use]
    pub const fn subnet(&self) -> Ipv4Cidr {
        self.subnet
    }

    /// Next address accepted by the filter, or `None` once the subnet is
    /// exhausted.
    pub fn next_ip(&self) -> Option<Ipv4Addr> {
        self.cursor.lock().find(|addr| (self.filter)(*addr))
    }
}

impl fmt::Debug for SubnetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubnetRange")
            .field("subnet", &self.subnet)
            .finish_non_exhaustive()
    }
}

fn default_filter(addr: Ipv4Addr) -> bool {
    let last = addr.octets()[3];
    last > 2 && last < 254
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_reserved_octets() {
        let range = SubnetRange::new("10.9.8.0/24".parse().unwrap());
        assert_eq!(range.next_ip(), Some(Ipv4Addr::new(10, 9, 8, 3)));
        assert_eq!(range.next_ip(), Some(Ipv4Addr::new(10, 9, 8, 4)));
    }

    #[test]
    fn exhausts_after_last_usable_address() {
        let range = SubnetRange::new("10.9.8.0/24".parse().unwrap());
        let all: Vec<_> = std::iter::from_fn(|| range.next_ip()).collect();

        assert_eq!(all.len(), 251);
        assert_eq!(all.last(), Some(&Ipv4Addr::new(10, 9, 8, 253)));
        assert_eq!(range.next_ip(), None);
    }

    #[test]
    fn custom_filter() {
        let range = SubnetRange::new("10.0.0.0/29".parse().unwrap())
            .with_filter(|addr| addr.octets()[3] % 2 == 0);
        let all: Vec<_> = std::iter::from_fn(|| range.next_ip()).collect();

        assert_eq!(
            all,
            vec![
                Ipv4Addr::new(10, 0, 0, 0),
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 4),
                Ipv4Addr::new(10, 0, 0, 6),
            ]
        );
    }
}
