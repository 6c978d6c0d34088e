//! Show command: print the currently committed set for a service.

use std::path::Path;

use anyhow::Result;

use crate::config::Config;
use crate::service_set::ServiceSet;

use super::loader_for;

pub fn run(config_path: &Path, service: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let loader = loader_for(&config);

    let set = ServiceSet::load_named(service, &loader)?;
    println!(
        "{}: {} services, {} targets",
        service,
        set.services().len(),
        set.targets().len()
    );
    for target in set.targets() {
        println!("  {target}");
    }
    Ok(())
}
