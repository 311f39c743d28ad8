//! Package manager wrapper
//!
//! apt-get for install/remove, dpkg-query for installed state,
//! apt-mark for holds.

use crate::errors::ProcessError;
use crate::system::{subp, RetryPolicy};
use tracing::warn;

/// Package manager operations the engine relies on
pub trait PackageManager: Send + Sync {
    fn refresh_lists(&self) -> Result<(), ProcessError>;

    fn install(&self, packages: &[String], retry: &RetryPolicy) -> Result<(), ProcessError>;

    fn remove(&self, packages: &[String]) -> Result<(), ProcessError>;

    /// Names of every installed package
    fn installed_packages(&self) -> Vec<String>;

    fn is_installed(&self, package: &str) -> bool {
        self.installed_packages().iter().any(|p| p == package)
    }

    fn held_packages(&self) -> Result<Vec<String>, ProcessError>;

    fn unhold(&self, packages: &[String]) -> Result<(), ProcessError>;
}

const APT_INSTALL_OPTIONS: &[&str] = &[
    "--assume-yes",
    "--allow-downgrades",
    "-o",
    "Dpkg::Options::=--force-confdef",
    "-o",
    "Dpkg::Options::=--force-confold",
];

/// apt/dpkg on the local machine
#[derive(Debug, Clone)]
pub struct Apt {
    update_retry: RetryPolicy,
}

impl Apt {
    pub fn new(update_retry: RetryPolicy) -> Self {
        Self { update_retry }
    }
}

impl PackageManager for Apt {
    fn refresh_lists(&self) -> Result<(), ProcessError> {
        subp(&["apt-get", "update"], true, &self.update_retry).map(|_| ())
    }

    fn install(&self, packages: &[String], retry: &RetryPolicy) -> Result<(), ProcessError> {
        let mut cmd: Vec<&str> = vec!["apt-get", "install"];
        cmd.extend_from_slice(APT_INSTALL_OPTIONS);
        cmd.extend(packages.iter().map(|p| p.as_str()));
        subp(&cmd, true, retry).map(|_| ())
    }

    fn remove(&self, packages: &[String]) -> Result<(), ProcessError> {
        let mut cmd: Vec<&str> = vec!["apt-get", "remove", "--assume-yes"];
        cmd.extend(packages.iter().map(|p| p.as_str()));
        subp(&cmd, true, &RetryPolicy::none()).map(|_| ())
    }

    fn installed_packages(&self) -> Vec<String> {
        match subp(
            &["dpkg-query", "-W", "--showformat=${db:Status-Status} ${Package}\\n"],
            true,
            &RetryPolicy::none(),
        ) {
            Ok(out) => parse_dpkg_query(&out),
            Err(e) => {
                warn!("Could not list installed packages: {}", e);
                Vec::new()
            }
        }
    }

    fn held_packages(&self) -> Result<Vec<String>, ProcessError> {
        let out = subp(&["apt-mark", "showholds"], true, &RetryPolicy::none())?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn unhold(&self, packages: &[String]) -> Result<(), ProcessError> {
        let mut cmd: Vec<&str> = vec!["apt-mark", "unhold"];
        cmd.extend(packages.iter().map(|p| p.as_str()));
        subp(&cmd, true, &RetryPolicy::none()).map(|_| ())
    }
}

/// Keep only packages whose status is "installed"
pub fn parse_dpkg_query(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let (status, name) = line.trim().split_once(' ')?;
            (status == "installed").then(|| name.trim().to_string())
        })
        .collect()
}
