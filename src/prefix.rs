//! Address prefixes used as traffic destinations.
//!
//! A [`Prefix`] is a network prefix of either family. Ordering puts IPv4
//! before IPv6, then sorts by address and ascending prefix length, which
//! places the unspecified prefix of each family first. That ordering is
//! what lets emitted wildcard services line up with default system
//! services.

use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::error::FwsetError;

/// The IPv4 wildcard `0.0.0.0/0`, top of the IPv4 coalesce lattice.
pub const UNSPECIFIED_IPV4: Prefix = Prefix {
    net: IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::UNSPECIFIED, 0)),
};

/// The IPv6 wildcard `::/0`, top of the IPv6 coalesce lattice.
pub const UNSPECIFIED_IPV6: Prefix = Prefix {
    net: IpNet::V6(Ipv6Net::new_assert(Ipv6Addr::UNSPECIFIED, 0)),
};

/// A network prefix: address family, address, and prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    net: IpNet,
}

impl Prefix {
    /// Creates a prefix from an address and prefix length.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, FwsetError> {
        let net = IpNet::new(addr, prefix_len)
            .map_err(|_| FwsetError::InvalidPrefix(format!("{addr}/{prefix_len}")))?;
        Ok(Prefix { net })
    }

    /// Creates a single-address prefix (`/32` or `/128`).
    pub fn from_addr(addr: IpAddr) -> Self {
        Prefix {
            net: IpNet::from(addr),
        }
    }

    pub fn addr(&self) -> IpAddr {
        self.net.addr()
    }

    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self.net, IpNet::V4(_))
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self.net, IpNet::V6(_))
    }

    /// Zeros the host bits. Idempotent.
    pub fn normalize(&self) -> Prefix {
        Prefix {
            net: self.net.trunc(),
        }
    }

    /// True iff `other` lies entirely within this prefix.
    ///
    /// Always false across families. Both sides are compared in
    /// normalized form.
    pub fn contains(&self, other: &Prefix) -> bool {
        match (self.net.trunc(), other.net.trunc()) {
            (IpNet::V4(a), IpNet::V4(b)) => a.contains(&b),
            (IpNet::V6(a), IpNet::V6(b)) => a.contains(&b),
            _ => false,
        }
    }

    /// Returns the smallest prefix covering both inputs when one contains
    /// the other or the two are sibling halves of a common parent, `None`
    /// otherwise.
    pub fn coalesce(&self, other: &Prefix) -> Option<Prefix> {
        if self.is_ipv4() != other.is_ipv4() {
            return None;
        }
        if self.contains(other) {
            return Some(*self);
        }
        if other.contains(self) {
            return Some(*other);
        }
        if self.prefix_len() == other.prefix_len() && self.prefix_len() > 0 {
            let parent = self.parent();
            if parent == other.parent() {
                return parent;
            }
        }
        None
    }

    /// The enclosing prefix one bit shorter, normalized. `None` at `/0`.
    fn parent(&self) -> Option<Prefix> {
        self.net.supernet().map(|net| Prefix { net: net.trunc() })
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        fn key(p: &Prefix) -> (u8, u128, u8) {
            match p.net {
                IpNet::V4(v4) => (0, u128::from(u32::from(v4.addr())), v4.prefix_len()),
                IpNet::V6(v6) => (1, u128::from(v6.addr()), v6.prefix_len()),
            }
        }
        key(self).cmp(&key(other))
    }
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Prefix {
    /// Single addresses render bare; everything else as `address/len`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix_len() == self.net.max_prefix_len() {
            self.addr().fmt(f)
        } else {
            self.net.fmt(f)
        }
    }
}

impl FromStr for Prefix {
    type Err = FwsetError;

    /// Accepts `address` (full-length prefix) and `address/len`.
    fn from_str(s: &str) -> Result<Self, FwsetError> {
        if s.contains('/') {
            let net = s
                .parse::<IpNet>()
                .map_err(|_| FwsetError::InvalidPrefix(s.to_string()))?;
            Ok(Prefix { net })
        } else {
            let addr = s
                .parse::<IpAddr>()
                .map_err(|_| FwsetError::InvalidPrefix(s.to_string()))?;
            Ok(Prefix::from_addr(addr))
        }
    }
}
