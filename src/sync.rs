//! Reconciliation between desired service sets and the host.
//!
//! A commit mutates the local services directory and the daemon's
//! permanent zone configuration so that each target zone activates
//! exactly the services of the committed sets. Services this library
//! never wrote are left alone. Every file mutation is either a rename
//! of a sibling temp file or an unlink, so an aborted commit leaves the
//! directory consistent for retry.
//!
//! Within one commit: removals precede writes, writes precede the
//! first reload, the first reload precedes zone additions, additions
//! precede the final reload. The first reload exists so that zone
//! additions never reference a service file the daemon has not seen.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::FwsetError;
use crate::firewall::Firewalld;
use crate::loader::ServiceLoader;
use crate::lock::CommitGuard;
use crate::service::Service;
use crate::service_set::ServiceSet;
use crate::xml;

/// Commits service sets to the host configuration, reconfiguring and
/// reloading the firewall as necessary.
///
/// `zones` names the zones the sets should be active in; for a typical
/// host this is just `public`. Template names must be unique across
/// `sets`.
pub fn commit(
    sets: &[ServiceSet],
    zones: &BTreeSet<String>,
    firewalld: &Firewalld,
    loader: &ServiceLoader,
) -> Result<(), FwsetError> {
    let mut sets_by_name: BTreeMap<&str, &ServiceSet> = BTreeMap::new();
    for set in sets {
        let name = set.template().name();
        if sets_by_name.insert(name, set).is_some() {
            return Err(FwsetError::InvalidArgument(format!(
                "duplicate service set name: {name}"
            )));
        }
        loader.check_system_conflict(name)?;
    }

    // The union of service names that should exist after the commit.
    let mut desired_names: BTreeSet<&str> = BTreeSet::new();
    for set in sets_by_name.values() {
        for service in set.services() {
            let inserted = desired_names.insert(service.name());
            assert!(inserted, "duplicate service name: {}", service.name());
        }
    }

    let _guard = CommitGuard::acquire(loader.local_dir())?;
    let mut needs_reload = false;

    // Remove managed services that should no longer be active, from
    // every zone. Foreign services are never touched.
    let zone_services = firewalld.list_all_zones()?;
    for (zone, services) in &zone_services {
        let keep = zones.contains(zone);
        let to_remove: Vec<&str> = services
            .iter()
            .map(String::as_str)
            .filter(|service| !(keep && desired_names.contains(service)))
            .filter(|service| sets_by_name.values().any(|set| set.is_member_name(service)))
            .collect();
        if !to_remove.is_empty() {
            debug!(zone = %zone, services = ?to_remove, "removing services from zone");
            firewalld.remove_services(zone, to_remove)?;
            needs_reload = true;
        }
    }

    // Delete managed local files that no desired service claims.
    for name in loader.local_service_names()? {
        if desired_names.contains(name.as_str()) {
            continue;
        }
        if sets_by_name.values().any(|set| set.is_member_name(&name)) {
            let path = loader.local_service_file(&name);
            info!(path = %path.display(), "deleting stale service file");
            fs::remove_file(&path)?;
            loader.invalidate(&path);
            needs_reload = true;
        }
    }

    // Write changed or missing service files.
    for set in sets_by_name.values() {
        let template_name = set.template().name();
        for service in set.services() {
            if service.name() == template_name {
                // When the first service equals the stock system file,
                // rely on the system file and drop any local override.
                if let Some(system) = loader.load_system_service(template_name)? {
                    if system == *service {
                        let path = loader.local_service_file(template_name);
                        if path.exists() {
                            info!(path = %path.display(), "system file covers service, deleting override");
                            fs::remove_file(&path)?;
                            loader.invalidate(&path);
                            needs_reload = true;
                        }
                        continue;
                    }
                }
            }
            let local = loader.load_local_service(service.name())?;
            if local.as_ref() != Some(service) {
                write_service_file(service, loader)?;
                needs_reload = true;
            }
        }
    }

    // Reload before additions so new service names are known to the
    // daemon.
    if needs_reload {
        firewalld.reload()?;
        needs_reload = false;
    }

    // Add any desired services missing from the target zones.
    for zone in zones {
        let current = zone_services
            .get(zone)
            .ok_or_else(|| FwsetError::NotFound(format!("zone {zone}")))?;
        let to_add: Vec<&str> = desired_names
            .iter()
            .copied()
            .filter(|service| !current.contains(*service))
            .collect();
        if !to_add.is_empty() {
            debug!(zone = %zone, services = ?to_add, "adding services to zone");
            firewalld.add_services(zone, to_add)?;
            needs_reload = true;
        }
    }

    if needs_reload {
        firewalld.reload()?;
    }
    Ok(())
}

/// Writes one service file atomically: emit into a sibling temp file,
/// then rename over the destination.
fn write_service_file(service: &Service, loader: &ServiceLoader) -> Result<(), FwsetError> {
    let path = loader.local_service_file(service.name());
    let bytes = xml::emit_service(service)?;
    fs::create_dir_all(loader.local_dir())?;
    let mut temp = NamedTempFile::new_in(loader.local_dir())?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(&path).map_err(|err| err.error)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
    loader.invalidate(&path);
    info!(path = %path.display(), "wrote service file");
    Ok(())
}

impl ServiceSet {
    /// Commits this single set. See [`commit`].
    pub fn commit(
        &self,
        zones: &BTreeSet<String>,
        firewalld: &Firewalld,
        loader: &ServiceLoader,
    ) -> Result<(), FwsetError> {
        commit(std::slice::from_ref(self), zones, firewalld, loader)
    }
}
