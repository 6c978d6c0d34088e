//! Service sets: one policy opened across arbitrary destinations.
//!
//! A single service definition admits at most one destination prefix
//! per family. A [`ServiceSet`] goes beyond that limit: it is a family
//! of services generated from a template, together admitting any set of
//! targets. The first service carries the template's name; additional
//! services are named `<template>-2`, `<template>-3`, and so on.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::FwsetError;
use crate::loader::ServiceLoader;
use crate::port::{PortRange, ProtocolOrPort};
use crate::prefix::Prefix;
use crate::protocol::Protocol;
use crate::service::Service;
use crate::target::Target;

/// A template plus the family of services implementing a target set.
#[derive(Debug, Clone)]
pub struct ServiceSet {
    template: Service,
    services: Vec<Service>,
    targets: BTreeSet<Target>,
}

impl ServiceSet {
    fn from_services(template: Service, services: Vec<Service>) -> ServiceSet {
        let mut targets = BTreeSet::new();
        for service in &services {
            targets.extend(service.targets());
        }
        ServiceSet {
            template,
            services,
            targets,
        }
    }

    /// The template whose metadata every member service carries.
    pub fn template(&self) -> &Service {
        &self.template
    }

    /// The member services, first one named after the template.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// The union of every member service's targets.
    ///
    /// May contain overlapping destinations when the set was loaded
    /// rather than optimized.
    pub fn targets(&self) -> &BTreeSet<Target> {
        &self.targets
    }

    /// True for the template name and `<template>-<int>` names: the
    /// services this set may have written in a previous commit.
    pub(crate) fn is_member_name(&self, service_name: &str) -> bool {
        if service_name == self.template.name() {
            return true;
        }
        service_name
            .strip_prefix(self.template.name())
            .and_then(|rest| rest.strip_prefix('-'))
            .map(|suffix| suffix.parse::<u32>().is_ok())
            .unwrap_or(false)
    }

    /// Builds the minimal service set admitting exactly `targets`.
    ///
    /// Every emitted service inherits the template's version, short
    /// name, description, source ports, and modules; its ports,
    /// protocols, and destinations come from the optimized targets.
    /// An empty target iterable yields an empty set.
    pub fn optimized<I>(template: Service, targets: I) -> ServiceSet
    where
        I: IntoIterator<Item = Target>,
    {
        // Phase 1: coalesce ports and protocols within each destination.
        // Popping the minimum keeps the reduction deterministic; each
        // re-queued merge strictly shrinks the remaining work.
        let mut entries_by_destination: BTreeMap<Prefix, BTreeSet<ProtocolOrPort>> =
            BTreeMap::new();
        let mut queue: BTreeSet<Target> = targets.into_iter().collect();
        while let Some(target) = queue.pop_first() {
            let destination = target.destination();
            let entry = target.entry();
            let entries = entries_by_destination.entry(destination).or_default();
            let mut merged = Vec::new();
            entries.retain(|existing| match entry.coalesce(existing) {
                Some(combined) => {
                    merged.push(combined);
                    false
                }
                None => true,
            });
            if merged.is_empty() {
                entries.insert(entry);
            } else {
                for combined in merged {
                    queue.insert(Target::from_entry(destination, combined));
                }
            }
        }
        debug!(
            destinations = entries_by_destination.len(),
            "coalesced ports by destination"
        );

        // Phase 2: coalesce destinations that share an identical entry
        // set. At most one merge per popped destination; the merged
        // prefix goes back on the queue so it can keep climbing.
        let mut destinations_by_entries: BTreeMap<Vec<ProtocolOrPort>, BTreeSet<Prefix>> =
            BTreeMap::new();
        let mut queue: BTreeMap<Prefix, Vec<ProtocolOrPort>> = entries_by_destination
            .into_iter()
            .map(|(destination, entries)| (destination, entries.into_iter().collect()))
            .collect();
        while let Some((destination, entries)) = queue.pop_first() {
            let group = destinations_by_entries.entry(entries.clone()).or_default();
            let coalesced = group
                .iter()
                .find_map(|existing| destination.coalesce(existing).map(|c| (*existing, c)));
            match coalesced {
                Some((existing, combined)) => {
                    group.remove(&existing);
                    let evicted = queue.insert(combined, entries);
                    assert!(
                        evicted.is_none(),
                        "coalesced destination already queued: {combined}"
                    );
                }
                None => {
                    group.insert(destination);
                }
            }
        }
        debug!(
            groups = destinations_by_entries.len(),
            "coalesced destinations by entry set"
        );

        // Phase 3: split each group's destinations by address family.
        let mut split_by_family: BTreeMap<Vec<ProtocolOrPort>, (BTreeSet<Prefix>, BTreeSet<Prefix>)> =
            BTreeMap::new();
        for (entries, destinations) in destinations_by_entries {
            let (ipv4, ipv6) = split_by_family.entry(entries).or_default();
            for destination in destinations {
                if destination.is_ipv4() {
                    ipv4.insert(destination);
                } else {
                    ipv6.insert(destination);
                }
            }
        }

        // Phase 4: emit services, pairing the k-th IPv4 destination with
        // the k-th IPv6 destination of each group. The unspecified
        // prefix sorts first within its family, so wildcard services
        // have the best chance of matching stock system files.
        let mut services: Vec<Service> = Vec::new();
        for (entries, (ipv4, ipv6)) in split_by_family {
            let mut ports: Vec<PortRange> = Vec::new();
            let mut protocols: Vec<Protocol> = Vec::new();
            for entry in &entries {
                match entry.port_range() {
                    Some(range) => ports.push(range),
                    None => protocols.push(entry.protocol()),
                }
            }
            let mut ipv4 = ipv4.into_iter();
            let mut ipv6 = ipv6.into_iter();
            loop {
                let destination_ipv4 = ipv4.next();
                let destination_ipv6 = ipv6.next();
                if destination_ipv4.is_none() && destination_ipv6.is_none() {
                    break;
                }
                let (name, short_name) = if services.is_empty() {
                    (
                        template.name().to_string(),
                        template.short_name().map(str::to_string),
                    )
                } else {
                    let num = services.len() + 1;
                    (
                        format!("{}-{}", template.name(), num),
                        template.short_name().map(|short| format!("{short} #{num}")),
                    )
                };
                debug!(service = %name, "adding service");
                let service = Service::new(
                    name,
                    template.version().map(str::to_string),
                    short_name,
                    template.description().map(str::to_string),
                    ports.clone(),
                    protocols.clone(),
                    template.source_ports().to_vec(),
                    template.modules().to_vec(),
                    destination_ipv4,
                    destination_ipv6,
                )
                .unwrap_or_else(|err| unreachable!("optimizer built an invalid service: {err}"));
                services.push(service);
            }
        }
        debug!(services = services.len(), "finished optimizing");
        ServiceSet::from_services(template, services)
    }

    /// Returns the optimal form of this set, or the set itself when it
    /// is already optimal.
    pub fn optimize(self) -> ServiceSet {
        let optimized =
            ServiceSet::optimized(self.template.clone(), self.targets.iter().copied());
        if optimized == self {
            self
        } else {
            optimized
        }
    }

    /// Loads the currently configured set for a template.
    ///
    /// The first member comes from the local override of the template
    /// name when present, otherwise from the system file; additional
    /// members come from local `<template>-<k>.xml` files in `k` order.
    /// A file that vanishes between listing and reading is skipped.
    pub fn load(template: Service, loader: &ServiceLoader) -> Result<ServiceSet, FwsetError> {
        debug!(template = %template.name(), "loading service set");
        loader.check_system_conflict(template.name())?;
        let mut services = Vec::new();
        if let Some(service) = loader.load_service(template.name())? {
            services.push(service);
        }
        for (index, path) in loader.local_member_files(template.name())? {
            let name = format!("{}-{}", template.name(), index);
            if let Some(service) = loader.load_file(&name, &path)? {
                services.push(service);
            }
        }
        Ok(ServiceSet::from_services(template, services))
    }

    /// Loads the currently configured set for a named system service,
    /// using that system service as the template.
    pub fn load_named(name: &str, loader: &ServiceLoader) -> Result<ServiceSet, FwsetError> {
        let template = loader
            .load_system_service(name)?
            .ok_or_else(|| FwsetError::NotFound(format!("system service {name}")))?;
        ServiceSet::load(template, loader)
    }
}

impl PartialEq for ServiceSet {
    /// Two sets are equal when they hold the same services; the
    /// template is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.services.len() == other.services.len()
            && self
                .services
                .iter()
                .all(|service| other.services.contains(service))
    }
}

impl Eq for ServiceSet {}
