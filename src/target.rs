//! Targets: the caller-facing unit of desired policy.
//!
//! A target pairs a normalized destination prefix with either a port
//! range or a bare protocol. It renders as
//! `port[-to]/protocol@address[/len]`, the form the CLI configuration
//! uses for rule declarations.

use std::fmt;
use std::str::FromStr;

use crate::error::FwsetError;
use crate::port::{PortRange, ProtocolOrPort};
use crate::prefix::Prefix;
use crate::protocol::Protocol;

/// A single allow-rule: destination prefix plus ports-axis entry.
///
/// The destination is normalized on construction; a target never
/// carries host bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target {
    destination: Prefix,
    entry: ProtocolOrPort,
}

impl Target {
    /// A target admitting one port range at a destination.
    pub fn new(destination: Prefix, range: PortRange) -> Target {
        Target {
            destination: destination.normalize(),
            entry: ProtocolOrPort::Range(range),
        }
    }

    /// A target admitting all ports of a protocol at a destination.
    pub fn protocol_only(destination: Prefix, protocol: Protocol) -> Target {
        Target {
            destination: destination.normalize(),
            entry: ProtocolOrPort::Protocol(protocol),
        }
    }

    pub fn from_entry(destination: Prefix, entry: ProtocolOrPort) -> Target {
        Target {
            destination: destination.normalize(),
            entry,
        }
    }

    /// The normalized destination prefix.
    pub fn destination(&self) -> Prefix {
        self.destination
    }

    pub fn protocol(&self) -> Protocol {
        self.entry.protocol()
    }

    pub fn port_range(&self) -> Option<PortRange> {
        self.entry.port_range()
    }

    pub fn entry(&self) -> ProtocolOrPort {
        self.entry
    }

    /// Combines two targets when the union stays expressible as one
    /// target: same destination with coalescible entries, or same entry
    /// with coalescible destinations. Widening both dimensions at once
    /// is never attempted.
    pub fn coalesce(&self, other: &Target) -> Option<Target> {
        if self.destination == other.destination {
            self.entry.coalesce(&other.entry).map(|entry| Target {
                destination: self.destination,
                entry,
            })
        } else if self.entry == other.entry {
            self.destination
                .coalesce(&other.destination)
                .map(|destination| Target {
                    destination,
                    entry: self.entry,
                })
        } else {
            None
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.entry, self.destination)
    }
}

impl FromStr for Target {
    type Err = FwsetError;

    /// Parses `22/tcp@1.2.3.0/24`, `22-25/tcp@::1`, or `esp@0.0.0.0/0`.
    fn from_str(s: &str) -> Result<Self, FwsetError> {
        let (ports, destination) = s
            .split_once('@')
            .ok_or_else(|| FwsetError::InvalidArgument(format!("target missing '@': {s:?}")))?;
        let destination: Prefix = destination.parse()?;
        match ports.rsplit_once('/') {
            None => {
                let protocol: Protocol = ports.parse()?;
                Ok(Target::protocol_only(destination, protocol))
            }
            Some((range, protocol)) => {
                let protocol: Protocol = protocol.parse()?;
                Ok(Target::new(destination, PortRange::parse(range, protocol)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::{UNSPECIFIED_IPV4, UNSPECIFIED_IPV6};

    fn target(s: &str) -> Target {
        s.parse().unwrap()
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(target("udp@192.0.2.123").to_string(), "udp@192.0.2.123");
        assert_eq!(
            target("53/udp@192.0.2.0/24").to_string(),
            "53/udp@192.0.2.0/24"
        );
        assert_eq!(
            target("80-81/tcp@192.0.2.123").to_string(),
            "80-81/tcp@192.0.2.123"
        );
    }

    #[test]
    fn test_parse_normalizes_destination() {
        assert_eq!(
            target("22-23/tcp@1.2.3.5/31"),
            target("22-23/tcp@1.2.3.4/31")
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("22/tcp".parse::<Target>().is_err());
        assert!("22/quic@1.2.3.4".parse::<Target>().is_err());
        assert!("0/tcp@1.2.3.4".parse::<Target>().is_err());
        assert!("22/tcp@1.2.3.4/40".parse::<Target>().is_err());
    }

    #[test]
    fn test_ordering_destination_first() {
        assert!(target("100/tcp@192.0.2.1") < target("80/tcp@192.0.2.2"));
    }

    #[test]
    fn test_ordering_ranges_before_bare_protocols() {
        assert!(target("53/udp@192.0.2.1") < target("udp@192.0.2.1"));
        assert!(target("udp@192.0.2.1") > target("53/udp@192.0.2.1"));
    }

    #[test]
    fn test_ordering_unspecified_first() {
        assert!(target("22/tcp@0.0.0.0/0") < target("22/tcp@1.2.3.4"));
        assert!(target("22/tcp@255.255.255.255") < target("22/tcp@::/0"));
    }

    #[test]
    fn test_coalesce_same_destination_merges_ports() {
        assert_eq!(
            target("22/tcp@1.2.3.4").coalesce(&target("23/tcp@1.2.3.4")),
            Some(target("22-23/tcp@1.2.3.4"))
        );
    }

    #[test]
    fn test_coalesce_same_destination_bare_protocol_absorbs() {
        assert_eq!(
            target("22/tcp@1.2.3.4").coalesce(&target("tcp@1.2.3.4")),
            Some(target("tcp@1.2.3.4"))
        );
    }

    #[test]
    fn test_coalesce_same_ports_merges_destinations() {
        assert_eq!(
            target("22/tcp@1.2.3.4").coalesce(&target("22/tcp@1.2.3.5")),
            Some(target("22/tcp@1.2.3.4/31"))
        );
        assert_eq!(
            target("22/tcp@1.2.3.4").coalesce(&target("22/tcp@0.0.0.0/0")),
            Some(target("22/tcp@0.0.0.0/0"))
        );
    }

    #[test]
    fn test_coalesce_refuses_double_widening() {
        // Both the ports and the destination would have to widen.
        assert_eq!(
            target("22/tcp@1.2.3.4").coalesce(&target("22-23/tcp@1.2.3.4/31")),
            None
        );
    }

    #[test]
    fn test_coalesce_refuses_cross_family() {
        assert_eq!(
            Target::new(
                UNSPECIFIED_IPV4,
                PortRange::single(22, Protocol::Tcp).unwrap()
            )
            .coalesce(&Target::new(
                UNSPECIFIED_IPV6,
                PortRange::single(22, Protocol::Tcp).unwrap()
            )),
            None
        );
    }

    #[test]
    fn test_coalesce_refuses_different_protocols() {
        assert_eq!(
            target("22/tcp@1.2.3.4").coalesce(&target("22/udp@1.2.3.4")),
            None
        );
    }
}
