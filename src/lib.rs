//! # fwset - firewalld service set management
//!
//! A library and CLI for opening arbitrary sets of
//! `(destination, protocol, port-range)` allow-rules through firewalld.
//! A firewalld service definition admits at most one destination prefix
//! per address family; fwset turns any set of [`Target`]s into a
//! minimal family of service definitions, writes them into the host's
//! service directories, and activates them in named zones through
//! `firewall-cmd`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         fwset                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: plan, apply, show                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)                                        │
//! │    └── Rule sets: template service + target strings         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Data model (ipnet)                                         │
//! │    └── Protocol, PortRange, Prefix, Target                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Optimizer (ServiceSet)                                     │
//! │    └── Coalesce ports, coalesce prefixes, pair families     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Loader (quick-xml)                                         │
//! │    └── Service XML parse/emit, mtime+length parse cache     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Synchronizer (firewall-cmd)                                │
//! │    └── Atomic file writes, zone reconciliation, reloads     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example usage
//!
//! ```no_run
//! use std::collections::BTreeSet;
//! use fwset::firewall::Firewalld;
//! use fwset::loader::ServiceLoader;
//! use fwset::service_set::ServiceSet;
//! use fwset::target::Target;
//!
//! fn main() -> anyhow::Result<()> {
//!     let loader = ServiceLoader::new();
//!     let template = loader
//!         .load_system_service("ssh")?
//!         .expect("ssh system service");
//!
//!     let targets: Vec<Target> = vec![
//!         "22/tcp@192.0.2.14".parse()?,
//!         "22/tcp@192.0.2.16".parse()?,
//!     ];
//!
//!     let set = ServiceSet::optimized(template, targets);
//!     let zones: BTreeSet<String> = ["public".to_string()].into();
//!     set.commit(&zones, &Firewalld::new(), &loader)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Protocol keywords, ordered by protocol number
//! - [`port`] - Port ranges and the ports-axis of a target
//! - [`prefix`] - Address prefixes with normalize/contains/coalesce
//! - [`target`] - The caller-facing `(destination, ports)` rule unit
//! - [`service`] - One daemon-level service definition
//! - [`xml`] - Service document parse and emit
//! - [`loader`] - Directory resolution and the parse cache
//! - [`service_set`] - The optimizer and set loading
//! - [`firewall`] - The `firewall-cmd` wrapper
//! - [`sync`] - Commit: reconcile files and zones
//! - [`lock`] - Cross-process commit serialization
//! - [`config`] / [`cli`] / [`commands`] - The command-line tool

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod firewall;
pub mod loader;
pub mod lock;
pub mod port;
pub mod prefix;
pub mod protocol;
pub mod service;
pub mod service_set;
pub mod sync;
pub mod target;
pub mod xml;

pub use config::Config;
pub use error::FwsetError;
pub use port::{PortRange, ProtocolOrPort};
pub use prefix::{Prefix, UNSPECIFIED_IPV4, UNSPECIFIED_IPV6};
pub use protocol::Protocol;
pub use service::Service;
pub use service_set::ServiceSet;
pub use target::Target;
