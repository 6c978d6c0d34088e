//! Plan command: print the services a commit would produce.

use std::path::Path;

use anyhow::Result;

use crate::config::Config;
use crate::service::Service;

use super::{build_set, loader_for};

pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let loader = loader_for(&config);

    for ruleset in &config.rulesets {
        let set = build_set(ruleset, &loader)?;
        println!("{} ({} targets)", ruleset.service, set.targets().len());
        for service in set.services() {
            print_service(service);
        }
        println!();
    }
    Ok(())
}

fn print_service(service: &Service) {
    let ports: Vec<String> = service
        .ports()
        .iter()
        .map(ToString::to_string)
        .chain(service.protocols().iter().map(ToString::to_string))
        .collect();
    let ipv4 = service
        .destination_ipv4()
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    let ipv6 = service
        .destination_ipv6()
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    println!(
        "  {:<20} {:<30} ipv4={} ipv6={}",
        service.name(),
        ports.join(","),
        ipv4,
        ipv6
    );
}
