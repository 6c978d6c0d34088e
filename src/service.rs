//! One daemon-level service definition.
//!
//! A [`Service`] mirrors the content of a single
//! `/usr/lib/firewalld/services/<name>.xml` or
//! `/etc/firewalld/services/<name>.xml` document: metadata, ports, bare
//! protocols, source ports, helper kernel modules, and at most one
//! destination prefix per address family. See `man 5 firewalld.service`.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::FwsetError;
use crate::port::PortRange;
use crate::prefix::Prefix;
use crate::protocol::Protocol;
use crate::target::Target;

/// File extension used on service files.
pub const SERVICE_EXTENSION: &str = ".xml";

/// An immutable service record.
///
/// Collections preserve their declaration order for output, but equality
/// compares them as sets.
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    version: Option<String>,
    short_name: Option<String>,
    description: Option<String>,
    ports: Vec<PortRange>,
    protocols: Vec<Protocol>,
    source_ports: Vec<PortRange>,
    modules: Vec<String>,
    destination_ipv4: Option<Prefix>,
    destination_ipv6: Option<Prefix>,
}

impl Service {
    /// Creates a service, validating its invariants:
    ///
    /// - non-empty name;
    /// - at least one of ports, protocols, or modules;
    /// - at least one destination, each of the matching family;
    /// - no duplicate ports, protocols, source ports, or modules.
    ///
    /// Empty metadata strings normalize to absent.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        version: Option<String>,
        short_name: Option<String>,
        description: Option<String>,
        ports: Vec<PortRange>,
        protocols: Vec<Protocol>,
        source_ports: Vec<PortRange>,
        modules: Vec<String>,
        destination_ipv4: Option<Prefix>,
        destination_ipv6: Option<Prefix>,
    ) -> Result<Self, FwsetError> {
        let name = name.into();
        if name.is_empty() {
            return Err(FwsetError::InvalidArgument("empty service name".to_string()));
        }
        if ports.is_empty() && protocols.is_empty() && modules.is_empty() {
            return Err(FwsetError::InvalidArgument(format!(
                "service {name} has no ports, protocols, or modules"
            )));
        }
        if destination_ipv4.is_none() && destination_ipv6.is_none() {
            return Err(FwsetError::InvalidArgument(format!(
                "service {name} has no destination"
            )));
        }
        if let Some(v4) = destination_ipv4 {
            if !v4.is_ipv4() {
                return Err(FwsetError::InvalidPrefix(format!(
                    "not an IPv4 destination: {v4}"
                )));
            }
        }
        if let Some(v6) = destination_ipv6 {
            if !v6.is_ipv6() {
                return Err(FwsetError::InvalidPrefix(format!(
                    "not an IPv6 destination: {v6}"
                )));
            }
        }
        check_unique(&name, "port", &ports)?;
        check_unique(&name, "protocol", &protocols)?;
        check_unique(&name, "source-port", &source_ports)?;
        check_unique(&name, "module", &modules)?;
        Ok(Service {
            name,
            version: none_if_empty(version),
            short_name: none_if_empty(short_name),
            description: none_if_empty(description),
            ports,
            protocols,
            source_ports,
            modules,
            destination_ipv4,
            destination_ipv6,
        })
    }

    /// The service name, used as the file stem and daemon identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn ports(&self) -> &[PortRange] {
        &self.ports
    }

    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    pub fn source_ports(&self) -> &[PortRange] {
        &self.source_ports
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn destination_ipv4(&self) -> Option<Prefix> {
        self.destination_ipv4
    }

    pub fn destination_ipv6(&self) -> Option<Prefix> {
        self.destination_ipv6
    }

    /// The targets this service admits: every port and bare protocol
    /// crossed with every present destination, in total order.
    ///
    /// A modules-only service admits no targets.
    pub fn targets(&self) -> BTreeSet<Target> {
        let mut targets = BTreeSet::new();
        for destination in [self.destination_ipv4, self.destination_ipv6]
            .into_iter()
            .flatten()
        {
            for port in &self.ports {
                targets.insert(Target::new(destination, *port));
            }
            for protocol in &self.protocols {
                targets.insert(Target::protocol_only(destination, *protocol));
            }
        }
        targets
    }
}

impl PartialEq for Service {
    /// Structural equality; the ordered collections compare as sets.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.short_name == other.short_name
            && self.description == other.description
            && set_eq(&self.ports, &other.ports)
            && set_eq(&self.protocols, &other.protocols)
            && set_eq(&self.source_ports, &other.source_ports)
            && set_eq(&self.modules, &other.modules)
            && self.destination_ipv4 == other.destination_ipv4
            && self.destination_ipv6 == other.destination_ipv6
    }
}

impl Eq for Service {}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn set_eq<T: Ord>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

fn check_unique<T: Ord + fmt::Debug>(
    service: &str,
    kind: &str,
    values: &[T],
) -> Result<(), FwsetError> {
    let mut seen = BTreeSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(FwsetError::InvalidArgument(format!(
                "service {service} has duplicate {kind}: {value:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::{UNSPECIFIED_IPV4, UNSPECIFIED_IPV6};

    fn ssh() -> Service {
        Service::new(
            "ssh",
            None,
            Some("SSH".to_string()),
            Some("Secure Shell".to_string()),
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            Some(UNSPECIFIED_IPV6),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_name() {
        let err = Service::new(
            "",
            None,
            None,
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_no_content() {
        let err = Service::new(
            "empty",
            None,
            None,
            None,
            vec![],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_no_destination() {
        let err = Service::new(
            "nodest",
            None,
            None,
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            None,
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_wrong_family_destination() {
        let err = Service::new(
            "wrongfam",
            None,
            None,
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV6),
            None,
        );
        assert!(matches!(err, Err(FwsetError::InvalidPrefix(_))));
    }

    #[test]
    fn test_rejects_duplicate_port() {
        let port = PortRange::single(22, Protocol::Tcp).unwrap();
        let err = Service::new(
            "dup",
            None,
            None,
            None,
            vec![port, port],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            None,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_empty_metadata_normalizes_to_absent() {
        let service = Service::new(
            "meta",
            Some(String::new()),
            Some(String::new()),
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            None,
        )
        .unwrap();
        assert_eq!(service.version(), None);
        assert_eq!(service.short_name(), None);
    }

    #[test]
    fn test_modules_only_service_has_no_targets() {
        let service = Service::new(
            "tftp-client",
            None,
            None,
            None,
            vec![],
            vec![],
            vec![],
            vec!["nf_conntrack_tftp".to_string()],
            Some(UNSPECIFIED_IPV4),
            Some(UNSPECIFIED_IPV6),
        )
        .unwrap();
        assert!(service.targets().is_empty());
    }

    #[test]
    fn test_targets_product() {
        let service = Service::new(
            "mixed",
            None,
            None,
            None,
            vec![PortRange::single(22, Protocol::Tcp).unwrap()],
            vec![Protocol::Esp],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            Some(UNSPECIFIED_IPV6),
        )
        .unwrap();
        let targets = service.targets();
        assert_eq!(targets.len(), 4);
        assert!(targets.contains(&"22/tcp@0.0.0.0/0".parse().unwrap()));
        assert!(targets.contains(&"esp@::/0".parse().unwrap()));
    }

    #[test]
    fn test_equality_ignores_collection_order() {
        let p22 = PortRange::single(22, Protocol::Tcp).unwrap();
        let p80 = PortRange::single(80, Protocol::Tcp).unwrap();
        let a = Service::new(
            "web",
            None,
            None,
            None,
            vec![p22, p80],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            None,
        )
        .unwrap();
        let b = Service::new(
            "web",
            None,
            None,
            None,
            vec![p80, p22],
            vec![],
            vec![],
            vec![],
            Some(UNSPECIFIED_IPV4),
            None,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_compares_name_and_destinations() {
        let mut other = ssh();
        other.name = "ssh-2".to_string();
        assert_ne!(ssh(), other);
    }
}
