//! Configuration for the fwset command-line tool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::firewall::FIREWALL_CMD;
use crate::loader::{LOCAL_SERVICES_DIRECTORY, SYSTEM_SERVICES_DIRECTORY};
use crate::target::Target;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Paths of the firewall daemon and its service directories.
    pub firewall: FirewallPaths,

    /// Zones the rule sets should be active in.
    pub zones: Vec<String>,

    /// Declared rule sets.
    pub rulesets: Vec<RuleSet>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            firewall: FirewallPaths::default(),
            zones: vec!["public".to_string()],
            rulesets: Vec::new(),
        }
    }
}

/// Host paths the tool operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallPaths {
    /// The firewall-cmd executable.
    pub firewall_cmd: PathBuf,

    /// Directory of distribution service files.
    pub system_services_dir: PathBuf,

    /// Directory of local service files.
    pub local_services_dir: PathBuf,
}

impl Default for FirewallPaths {
    fn default() -> Self {
        Self {
            firewall_cmd: PathBuf::from(FIREWALL_CMD),
            system_services_dir: PathBuf::from(SYSTEM_SERVICES_DIRECTORY),
            local_services_dir: PathBuf::from(LOCAL_SERVICES_DIRECTORY),
        }
    }
}

/// One declared rule set: a template service opened on a set of
/// targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Name of the template service; must exist as a system service.
    pub service: String,

    /// Targets in `port[-to]/protocol@address[/len]` form.
    pub targets: Vec<String>,
}

impl RuleSet {
    /// Parses the declared target strings.
    pub fn parsed_targets(&self) -> Result<Vec<Target>> {
        self.targets
            .iter()
            .map(|spec| {
                spec.parse::<Target>()
                    .with_context(|| format!("invalid target {spec:?} in rule set {}", self.service))
            })
            .collect()
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            serde_yaml::from_str(&content).with_context(|| "failed to parse config file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
zones:
  - public
  - internal
rulesets:
  - service: ssh
    targets:
      - 22/tcp@192.0.2.0/24
      - 22/tcp@2001:db8::/32
  - service: https
    targets:
      - 443/tcp@0.0.0.0/0
";

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.zones, vec!["public".to_string()]);
        assert_eq!(
            config.firewall.firewall_cmd,
            PathBuf::from("/usr/bin/firewall-cmd")
        );
        assert_eq!(
            config.firewall.local_services_dir,
            PathBuf::from("/etc/firewalld/services")
        );
    }

    #[test]
    fn test_load_sample() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.zones.len(), 2);
        assert_eq!(config.rulesets.len(), 2);
        let targets = config.rulesets[0].parsed_targets().unwrap();
        assert_eq!(targets.len(), 2);
        // Defaults fill the unspecified firewall paths.
        assert_eq!(
            config.firewall.system_services_dir,
            PathBuf::from("/usr/lib/firewalld/services")
        );
    }

    #[test]
    fn test_bad_target_names_the_rule_set() {
        let ruleset = RuleSet {
            service: "ssh".to_string(),
            targets: vec!["not-a-target".to_string()],
        };
        let err = ruleset.parsed_targets().unwrap_err();
        assert!(err.to_string().contains("ssh"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(Config::load("/nonexistent/fwset.yaml").is_err());
    }
}
