//! Wrapper around the `firewall-cmd` control program.
//!
//! Command execution sits behind a trait so tests can mock the external
//! program without a running daemon. A process-wide lock serializes
//! every invocation; `firewall-cmd` does not tolerate concurrent
//! permanent-configuration changes.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::debug;

use crate::error::FwsetError;

#[cfg(test)]
use mockall::automock;

/// The default path of the `firewall-cmd` executable.
pub const FIREWALL_CMD: &str = "/usr/bin/firewall-cmd";

/// Serializes access to the underlying control program.
static FIREWALL_CMD_LOCK: Mutex<()> = Mutex::new(());

/// Output from command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

/// Trait for command execution, allowing dependency injection for
/// testing.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with the given arguments.
    fn execute(&self, cmd: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Real implementation that runs actual system commands.
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> io::Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Helper to convert a slice of `&str` to owned arguments.
///
/// Mockall has lifetime trouble with `&[&str]`, so the trait takes
/// `&[String]`.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Handle on the host's firewall control program.
pub struct Firewalld {
    executable: PathBuf,
    executor: Box<dyn CommandExecutor>,
}

impl Default for Firewalld {
    fn default() -> Self {
        Firewalld::new()
    }
}

impl Firewalld {
    /// A handle using the default executable path.
    pub fn new() -> Self {
        Firewalld::with_executable(FIREWALL_CMD)
    }

    /// A handle using an explicit executable path.
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Firewalld {
            executable: executable.into(),
            executor: Box::new(RealCommandExecutor),
        }
    }

    /// A handle using a caller-supplied executor, for tests.
    pub fn with_executor(executor: Box<dyn CommandExecutor>) -> Self {
        Firewalld {
            executable: PathBuf::from(FIREWALL_CMD),
            executor,
        }
    }

    /// Runs the control program, holding the process-wide lock for the
    /// duration. Non-zero exit surfaces as `External` carrying stderr.
    fn exec(&self, args: &[&str]) -> Result<CommandOutput, FwsetError> {
        let executable = self.executable.to_string_lossy().into_owned();
        debug!(cmd = %executable, ?args, "invoking firewall-cmd");
        let output = {
            let _guard = FIREWALL_CMD_LOCK
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.executor
                .execute(&executable, &args_to_strings(args))
                .map_err(|err| FwsetError::External(format!("{executable}: {err}")))?
        };
        if !output.success {
            return Err(FwsetError::External(output.stderr.trim().to_string()));
        }
        Ok(output)
    }

    /// Zone names mapped to their permanently configured services.
    pub fn list_all_zones(&self) -> Result<BTreeMap<String, BTreeSet<String>>, FwsetError> {
        let output = self.exec(&["--permanent", "--list-all-zones"])?;
        Ok(parse_zone_listing(&output.stdout))
    }

    /// Adds services to a zone's permanent configuration.
    pub fn add_services<'a, I>(&self, zone: &str, services: I) -> Result<(), FwsetError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let zone_arg = format!("--zone={zone}");
        let mut args = vec!["--permanent", zone_arg.as_str()];
        let service_args: Vec<String> = services
            .into_iter()
            .map(|service| format!("--add-service={service}"))
            .collect();
        args.extend(service_args.iter().map(String::as_str));
        self.exec(&args)?;
        Ok(())
    }

    /// Removes services from a zone's permanent configuration.
    pub fn remove_services<'a, I>(&self, zone: &str, services: I) -> Result<(), FwsetError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let zone_arg = format!("--zone={zone}");
        let mut args = vec!["--permanent", zone_arg.as_str()];
        let service_args: Vec<String> = services
            .into_iter()
            .map(|service| format!("--remove-service={service}"))
            .collect();
        args.extend(service_args.iter().map(String::as_str));
        self.exec(&args)?;
        Ok(())
    }

    /// Reloads the daemon, activating permanent configuration.
    pub fn reload(&self) -> Result<(), FwsetError> {
        self.exec(&["--reload"])?;
        Ok(())
    }
}

/// Parses `--list-all-zones` output.
///
/// Zones begin at column zero, optionally suffixed ` (active)`.
/// Indented `services:` lines carry space-separated service names;
/// every other indented line is ignored.
pub fn parse_zone_listing(stdout: &str) -> BTreeMap<String, BTreeSet<String>> {
    let mut zones: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in stdout.lines() {
        if line.is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            let zone = line
                .trim_end()
                .trim_end_matches(" (active)")
                .to_string();
            zones.entry(zone.clone()).or_default();
            current = Some(zone);
        } else if let Some(zone) = &current {
            let trimmed = line.trim_start();
            if let Some(services) = trimmed.strip_prefix("services:") {
                zones
                    .entry(zone.clone())
                    .or_default()
                    .extend(services.split_whitespace().map(str::to_string));
            }
        }
    }
    zones
}

/// Check that the process runs with effective UID 0.
///
/// Mutating the permanent firewall configuration requires root; failing
/// early gives a clearer message than a cascade of permission errors.
pub fn check_root() -> Result<(), FwsetError> {
    // SAFETY: geteuid reads the effective user ID; it has no
    // preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(FwsetError::External(
            "this operation requires root privileges".to_string(),
        ));
    }
    Ok(())
}
