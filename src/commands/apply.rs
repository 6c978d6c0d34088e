//! Apply command: commit the configured rule sets.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::firewall::{check_root, Firewalld};
use crate::sync;

use super::{build_set, loader_for};

pub fn run(config_path: &Path) -> Result<()> {
    check_root()?;
    let config = Config::load(config_path)?;
    let loader = loader_for(&config);
    let firewalld = Firewalld::with_executable(&config.firewall.firewall_cmd);

    let mut sets = Vec::with_capacity(config.rulesets.len());
    for ruleset in &config.rulesets {
        sets.push(build_set(ruleset, &loader)?);
    }
    let zones: BTreeSet<String> = config.zones.iter().cloned().collect();

    sync::commit(&sets, &zones, &firewalld, &loader)?;
    info!(
        sets = sets.len(),
        zones = zones.len(),
        "committed service sets"
    );
    Ok(())
}
