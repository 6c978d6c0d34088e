//! Service file loading with a parse cache.
//!
//! Services live in two directories: the distribution's read-only
//! system directory and the administrator's local directory, where a
//! file of the same name overrides the system one. A [`ServiceLoader`]
//! resolves names against both and caches parse results keyed by file
//! identity, invalidated whenever the observed mtime or length changes.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::{debug, trace};

use crate::error::FwsetError;
use crate::service::{Service, SERVICE_EXTENSION};
use crate::xml;

/// The directory containing distribution service files.
pub const SYSTEM_SERVICES_DIRECTORY: &str = "/usr/lib/firewalld/services";

/// The directory containing local overrides and additional services.
pub const LOCAL_SERVICES_DIRECTORY: &str = "/etc/firewalld/services";

#[derive(Debug, Clone)]
struct CacheEntry {
    mtime: SystemTime,
    len: u64,
    service: Service,
}

/// Loads and caches service definitions from the host's directories.
///
/// The cache lock is held only around map access, never across file
/// reads, so concurrent loads of different files proceed in parallel.
#[derive(Debug)]
pub struct ServiceLoader {
    system_dir: PathBuf,
    local_dir: PathBuf,
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl Default for ServiceLoader {
    fn default() -> Self {
        ServiceLoader::new()
    }
}

impl ServiceLoader {
    /// A loader over the standard firewalld directories.
    pub fn new() -> Self {
        ServiceLoader::with_dirs(SYSTEM_SERVICES_DIRECTORY, LOCAL_SERVICES_DIRECTORY)
    }

    /// A loader over explicit directories.
    pub fn with_dirs(system_dir: impl Into<PathBuf>, local_dir: impl Into<PathBuf>) -> Self {
        ServiceLoader {
            system_dir: system_dir.into(),
            local_dir: local_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn system_dir(&self) -> &Path {
        &self.system_dir
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// The local file path that would hold the named service.
    pub fn local_service_file(&self, name: &str) -> PathBuf {
        self.local_dir.join(format!("{name}{SERVICE_EXTENSION}"))
    }

    /// Loads a service from the system directory, `None` when absent.
    pub fn load_system_service(&self, name: &str) -> Result<Option<Service>, FwsetError> {
        let path = self.system_dir.join(format!("{name}{SERVICE_EXTENSION}"));
        self.load_file(name, &path)
    }

    /// Loads a service from the local directory, `None` when absent.
    pub fn load_local_service(&self, name: &str) -> Result<Option<Service>, FwsetError> {
        let path = self.local_service_file(name);
        self.load_file(name, &path)
    }

    /// Loads the effective service for a name: the local override when
    /// present, the system file otherwise.
    pub fn load_service(&self, name: &str) -> Result<Option<Service>, FwsetError> {
        match self.load_local_service(name)? {
            Some(service) => Ok(Some(service)),
            None => self.load_system_service(name),
        }
    }

    /// Loads and caches one service file. A missing file drops any
    /// stale cache entry and reports absent.
    pub fn load_file(&self, name: &str, path: &Path) -> Result<Option<Service>, FwsetError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.cache.lock().unwrap().remove(path);
                return Ok(None);
            }
            Err(err) => return Err(FwsetError::from(err).in_file(path)),
        };
        let mtime = metadata.modified().map_err(FwsetError::from)?;
        let len = metadata.len();

        {
            let cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.get(path) {
                if entry.mtime == mtime && entry.len == len {
                    trace!(path = %path.display(), "service parse cache hit");
                    return Ok(Some(entry.service.clone()));
                }
            }
        }

        debug!(path = %path.display(), "parsing service file");
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            // Deleted between stat and read.
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.cache.lock().unwrap().remove(path);
                return Ok(None);
            }
            Err(err) => return Err(FwsetError::from(err).in_file(path)),
        };
        let service = xml::parse_service(name, &bytes).map_err(|err| err.in_file(path))?;
        self.cache.lock().unwrap().insert(
            path.to_path_buf(),
            CacheEntry {
                mtime,
                len,
                service: service.clone(),
            },
        );
        Ok(Some(service))
    }

    /// Forgets a path's cache entry, e.g. after rewriting the file.
    pub fn invalidate(&self, path: &Path) {
        self.cache.lock().unwrap().remove(path);
    }

    /// Fails when the system directory contains a file matching the
    /// managed pattern `<template>-<int>.xml`; such a file would
    /// collide with the names this library generates and requires
    /// administrator intervention.
    pub fn check_system_conflict(&self, template_name: &str) -> Result<(), FwsetError> {
        for file_name in list_dir(&self.system_dir)? {
            if member_index(template_name, &file_name).is_some() {
                return Err(FwsetError::Conflict(
                    self.system_dir.join(file_name).display().to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Local member files `<template>-<k>.xml`, ordered by `k`.
    pub fn local_member_files(
        &self,
        template_name: &str,
    ) -> Result<Vec<(u32, PathBuf)>, FwsetError> {
        let mut members: Vec<(u32, PathBuf)> = list_dir(&self.local_dir)?
            .into_iter()
            .filter_map(|file_name| {
                member_index(template_name, &file_name)
                    .map(|k| (k, self.local_dir.join(file_name)))
            })
            .collect();
        members.sort();
        Ok(members)
    }

    /// File stems of every `.xml` file in the local directory.
    pub fn local_service_names(&self) -> Result<Vec<String>, FwsetError> {
        Ok(list_dir(&self.local_dir)?
            .into_iter()
            .filter_map(|file_name| {
                file_name
                    .strip_suffix(SERVICE_EXTENSION)
                    .map(str::to_string)
            })
            .collect())
    }
}

/// Directory listing tolerating a missing directory.
fn list_dir(dir: &Path) -> Result<Vec<String>, FwsetError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(FwsetError::from(err).in_file(dir)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(FwsetError::from)?;
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Parses `<template>-<k>.xml` file names, returning `k`.
pub(crate) fn member_index(template_name: &str, file_name: &str) -> Option<u32> {
    let stem = file_name.strip_suffix(SERVICE_EXTENSION)?;
    let suffix = stem.strip_prefix(template_name)?.strip_prefix('-')?;
    suffix.parse().ok()
}
