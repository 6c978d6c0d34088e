//! CLI command implementations.

pub mod apply;
pub mod plan;
pub mod show;

use anyhow::{Context, Result};

use crate::config::{Config, RuleSet};
use crate::loader::ServiceLoader;
use crate::service_set::ServiceSet;

/// Builds the optimized service set for one configured rule set, using
/// the named system service as the template.
pub(crate) fn build_set(ruleset: &RuleSet, loader: &ServiceLoader) -> Result<ServiceSet> {
    let template = loader
        .load_system_service(&ruleset.service)
        .with_context(|| format!("loading system service {}", ruleset.service))?
        .with_context(|| format!("system service not found: {}", ruleset.service))?;
    let targets = ruleset.parsed_targets()?;
    Ok(ServiceSet::optimized(template, targets))
}

/// A loader over the configured directories.
pub(crate) fn loader_for(config: &Config) -> ServiceLoader {
    ServiceLoader::with_dirs(
        &config.firewall.system_services_dir,
        &config.firewall.local_services_dir,
    )
}
