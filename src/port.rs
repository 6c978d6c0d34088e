//! Port ranges and the ports-axis of a target.
//!
//! A [`PortRange`] is a closed interval of ports within one protocol. A
//! [`ProtocolOrPort`] is either such a range or a bare protocol meaning
//! "all ports of that protocol"; it is the unit the optimizer coalesces.

use std::fmt;

use crate::error::FwsetError;
use crate::protocol::Protocol;

/// A port or inclusive port range within a single protocol.
///
/// A single port is the degenerate case `from == to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortRange {
    from: u16,
    to: u16,
    protocol: Protocol,
}

impl PortRange {
    /// Creates a port range, rejecting `from == 0` and `from > to`.
    pub fn new(from: u16, to: u16, protocol: Protocol) -> Result<Self, FwsetError> {
        if from == 0 || from > to {
            return Err(FwsetError::InvalidRange {
                from: u32::from(from),
                to: u32::from(to),
            });
        }
        Ok(PortRange { from, to, protocol })
    }

    /// Creates a single-port range.
    pub fn single(port: u16, protocol: Protocol) -> Result<Self, FwsetError> {
        PortRange::new(port, port, protocol)
    }

    /// Parses the `port` attribute of a service file: `N` or `N-M`.
    pub fn parse(port: &str, protocol: Protocol) -> Result<Self, FwsetError> {
        let (from, to) = match port.split_once('-') {
            None => {
                let single = parse_port_number(port)?;
                (single, single)
            }
            Some((from, to)) => (parse_port_number(from)?, parse_port_number(to)?),
        };
        PortRange::new(from, to, protocol)
    }

    pub fn from(&self) -> u16 {
        self.from
    }

    pub fn to(&self) -> u16 {
        self.to
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The `port` attribute value for a service file: `N` or `N-M`.
    pub fn port_attr(&self) -> String {
        if self.from == self.to {
            self.from.to_string()
        } else {
            format!("{}-{}", self.from, self.to)
        }
    }

    /// Returns the union of two ranges when their intervals touch or
    /// overlap and they share a protocol, `None` otherwise.
    pub fn coalesce(&self, other: &PortRange) -> Option<PortRange> {
        if self.protocol != other.protocol {
            return None;
        }
        let touches = u32::from(self.to) + 1 >= u32::from(other.from)
            && u32::from(other.to) + 1 >= u32::from(self.from);
        if !touches {
            return None;
        }
        Some(PortRange {
            from: self.from.min(other.from),
            to: self.to.max(other.to),
            protocol: self.protocol,
        })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port_attr(), self.protocol)
    }
}

fn parse_port_number(s: &str) -> Result<u16, FwsetError> {
    s.trim()
        .parse::<u16>()
        .map_err(|_| FwsetError::InvalidArgument(format!("invalid port number: {s:?}")))
}

/// Either a bare protocol (all ports of that protocol) or a port range.
///
/// Ranges sort strictly before bare protocols so emitted service output
/// lists `<port>` entries ahead of `<protocol>` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolOrPort {
    Range(PortRange),
    Protocol(Protocol),
}

impl ProtocolOrPort {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProtocolOrPort::Range(range) => range.protocol(),
            ProtocolOrPort::Protocol(protocol) => *protocol,
        }
    }

    pub fn port_range(&self) -> Option<PortRange> {
        match self {
            ProtocolOrPort::Range(range) => Some(*range),
            ProtocolOrPort::Protocol(_) => None,
        }
    }

    /// Returns the union of two entries when expressible, `None` otherwise.
    ///
    /// A bare protocol absorbs every range of the same protocol; different
    /// protocols never combine.
    pub fn coalesce(&self, other: &ProtocolOrPort) -> Option<ProtocolOrPort> {
        if self.protocol() != other.protocol() {
            return None;
        }
        match (self, other) {
            (ProtocolOrPort::Protocol(_), _) => Some(*self),
            (_, ProtocolOrPort::Protocol(_)) => Some(*other),
            (ProtocolOrPort::Range(a), ProtocolOrPort::Range(b)) => {
                a.coalesce(b).map(ProtocolOrPort::Range)
            }
        }
    }
}

impl From<PortRange> for ProtocolOrPort {
    fn from(range: PortRange) -> Self {
        ProtocolOrPort::Range(range)
    }
}

impl From<Protocol> for ProtocolOrPort {
    fn from(protocol: Protocol) -> Self {
        ProtocolOrPort::Protocol(protocol)
    }
}

impl Ord for ProtocolOrPort {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (ProtocolOrPort::Range(a), ProtocolOrPort::Range(b)) => a.cmp(b),
            (ProtocolOrPort::Range(_), ProtocolOrPort::Protocol(_)) => Ordering::Less,
            (ProtocolOrPort::Protocol(_), ProtocolOrPort::Range(_)) => Ordering::Greater,
            (ProtocolOrPort::Protocol(a), ProtocolOrPort::Protocol(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for ProtocolOrPort {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ProtocolOrPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolOrPort::Range(range) => range.fmt(f),
            ProtocolOrPort::Protocol(protocol) => protocol.fmt(f),
        }
    }
}
