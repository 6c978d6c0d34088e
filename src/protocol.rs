//! IP protocols accepted in service definitions.
//!
//! Identified by their `/etc/protocols` keyword and ordered by IANA
//! protocol number, so sorted output lists tcp before udp before sctp.

use std::fmt;
use std::str::FromStr;

use crate::error::FwsetError;

/// A protocol a service definition may reference.
///
/// The discriminant is the IANA protocol number; the derived ordering
/// follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Icmp = 1,
    Igmp = 2,
    Tcp = 6,
    Udp = 17,
    Dccp = 33,
    Gre = 47,
    Esp = 50,
    Ah = 51,
    Ipv6Icmp = 58,
    Sctp = 132,
    UdpLite = 136,
}

impl Protocol {
    /// All protocols, in protocol-number order.
    pub const ALL: &'static [Protocol] = &[
        Protocol::Icmp,
        Protocol::Igmp,
        Protocol::Tcp,
        Protocol::Udp,
        Protocol::Dccp,
        Protocol::Gre,
        Protocol::Esp,
        Protocol::Ah,
        Protocol::Ipv6Icmp,
        Protocol::Sctp,
        Protocol::UdpLite,
    ];

    /// The IANA protocol number.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// The `/etc/protocols` keyword, as written in service files.
    pub fn keyword(self) -> &'static str {
        match self {
            Protocol::Icmp => "icmp",
            Protocol::Igmp => "igmp",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Dccp => "dccp",
            Protocol::Gre => "gre",
            Protocol::Esp => "esp",
            Protocol::Ah => "ah",
            Protocol::Ipv6Icmp => "ipv6-icmp",
            Protocol::Sctp => "sctp",
            Protocol::UdpLite => "udplite",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Protocol {
    type Err = FwsetError;

    /// Parses a keyword case-insensitively, as the daemon does.
    fn from_str(s: &str) -> Result<Self, FwsetError> {
        let lower = s.to_ascii_lowercase();
        Protocol::ALL
            .iter()
            .copied()
            .find(|p| p.keyword() == lower)
            .ok_or_else(|| FwsetError::InvalidArgument(format!("unknown protocol: {s}")))
    }
}
