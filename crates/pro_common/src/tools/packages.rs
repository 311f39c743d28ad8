//! Package-backed services (FIPS family, real-time kernel)
//!
//! Attaching writes the repository credential, releases conflicting holds
//! and installs the package set. Token rotation rewrites the credential in
//! place; packages are left alone. Containers skip the metapackage, so every
//! attach there reruns the conditional upgrades.

use super::ServiceTool;
use crate::apt::PackageManager;
use crate::config::Config;
use crate::entitlements::{ConditionalPackages, PackageProbe, PackageSet};
use crate::errors::ToolError;
use crate::events::EventSink;
use crate::messages::{self, NamedMessage};
use crate::system::{HostProbe, RetryPolicy};
use crate::types::RawStatus;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

const CONDITIONAL_EVERYWHERE: &[&str] = &[
    "strongswan",
    "strongswan-hmac",
    "openssh-client",
    "openssh-server",
];
const CONDITIONAL_OPENSSH_HMAC: &[&str] = &["openssh-client-hmac", "openssh-server-hmac"];
const METAPACKAGE_DEPENDS_XENIAL: &[&str] = &["openssl", "libssl1.0.0", "libssl1.0.0-hmac"];
const METAPACKAGE_DEPENDS_BIONIC_FOCAL: &[&str] = &[
    "openssl",
    "libssl1.1",
    "libssl1.1-hmac",
    "libgcrypt20",
    "libgcrypt20-hmac",
];

/// FIPS variants worth installing when their base package is present
///
/// In containers the metapackage is skipped, so its crypto dependencies
/// are upgraded individually instead.
pub fn fips_conditional_packages(series: &str, container: bool) -> Vec<&'static str> {
    let mut pkgs: Vec<&'static str> = match series {
        "xenial" | "bionic" => [CONDITIONAL_EVERYWHERE, CONDITIONAL_OPENSSH_HMAC].concat(),
        "focal" => CONDITIONAL_EVERYWHERE.to_vec(),
        _ => return Vec::new(),
    };
    if container {
        pkgs.extend_from_slice(match series {
            "xenial" => METAPACKAGE_DEPENDS_XENIAL,
            _ => METAPACKAGE_DEPENDS_BIONIC_FOCAL,
        });
    }
    pkgs
}

/// Conditional packages whose base package (name without `-hmac`) is installed
pub fn select_conditional(candidates: &[&str], installed: &[String]) -> Vec<String> {
    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for pkg in candidates {
        let base = pkg.strip_suffix("-hmac").unwrap_or(pkg);
        groups.entry(base).or_default().push(pkg);
    }
    groups
        .into_iter()
        .filter(|(base, _)| installed.iter().any(|i| i == base))
        .flat_map(|(_, mut group)| {
            group.sort();
            group.into_iter().map(String::from)
        })
        .collect()
}

/// `https://esm.ubuntu.com/fips/ubuntu` -> `esm.ubuntu.com/fips/ubuntu/`
pub fn auth_machine_entry(repo_url: &str) -> String {
    let stripped = repo_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("{}/", stripped)
}

pub struct PackageServiceTool {
    title: &'static str,
    set: PackageSet,
    packages: Arc<dyn PackageManager>,
    host: Arc<dyn HostProbe>,
    events: Arc<dyn EventSink>,
    auth_file: PathBuf,
    /// Shared by every tool writing the same auth file
    auth_lock: Arc<Mutex<()>>,
    fips_proc_file: PathBuf,
    apt_retry: RetryPolicy,
}

impl PackageServiceTool {
    pub fn new(
        title: &'static str,
        set: PackageSet,
        packages: Arc<dyn PackageManager>,
        host: Arc<dyn HostProbe>,
        events: Arc<dyn EventSink>,
        config: &Config,
    ) -> Self {
        Self {
            title,
            set,
            packages,
            host,
            events,
            auth_file: config.paths.apt_auth_file.clone(),
            auth_lock: Arc::new(Mutex::new(())),
            fips_proc_file: config.paths.fips_proc_file.clone(),
            apt_retry: config.retries.apt_policy(),
        }
    }

    pub fn with_auth_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.auth_lock = lock;
        self
    }

    /// Required packages for this host
    fn required_packages(&self) -> Vec<String> {
        if self.set.skip_packages_in_container && self.host.is_container() {
            return Vec::new();
        }
        self.set.packages.iter().map(|p| p.to_string()).collect()
    }

    fn conditional_candidates(&self) -> Vec<&'static str> {
        match self.set.conditional {
            ConditionalPackages::None => Vec::new(),
            ConditionalPackages::Fips => {
                fips_conditional_packages(&self.host.series(), self.host.is_container())
            }
        }
    }

    fn has_auth_entry(&self) -> bool {
        let entry = auth_machine_entry(self.set.repo_url);
        fs::read_to_string(&self.auth_file)
            .map(|content| content.lines().any(|l| is_entry_line(l, &entry)))
            .unwrap_or(false)
    }

    fn write_auth_entry(&self, token: Option<&str>) -> Result<(), ToolError> {
        let entry = auth_machine_entry(self.set.repo_url);
        let _guard = self.auth_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let existing = match fs::read_to_string(&self.auth_file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut lines: Vec<String> = existing
            .lines()
            .filter(|l| !is_entry_line(l, &entry))
            .map(String::from)
            .collect();
        if let Some(token) = token {
            lines.push(format!("machine {} login bearer password {}", entry, token));
        }
        write_private(&self.auth_file, &lines)?;
        Ok(())
    }

    fn release_holds(&self) -> Result<(), ToolError> {
        if self.set.holds.is_empty() {
            return Ok(());
        }
        let unholds: Vec<String> = self
            .packages
            .held_packages()?
            .into_iter()
            .filter(|h| self.set.holds.iter().any(|held| *held == h.as_str()))
            .collect();
        if !unholds.is_empty() {
            info!("Releasing package holds: {}", unholds.join(", "));
            self.packages.unhold(&unholds)?;
        }
        Ok(())
    }

    fn install_conditional(&self) {
        let installed = self.packages.installed_packages();
        for pkg in select_conditional(&self.conditional_candidates(), &installed) {
            if let Err(e) = self.packages.install(&[pkg.clone()], &self.apt_retry) {
                debug!("Optional package {} failed: {}", pkg, e);
                self.events.info(
                    &messages::PACKAGE_NOT_AVAILABLE
                        .format(&[("title", self.title), ("pkg", &pkg)])
                        .msg,
                );
            }
        }
    }
}

fn is_entry_line(line: &str, entry: &str) -> bool {
    line.trim_start()
        .strip_prefix("machine ")
        .map(|rest| rest.split_whitespace().next() == Some(entry))
        .unwrap_or(false)
}

fn write_private(path: &Path, lines: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

impl ServiceTool for PackageServiceTool {
    fn tool_name(&self) -> &str {
        self.set.packages.first().copied().unwrap_or(self.title)
    }

    fn is_installed(&self) -> bool {
        let required = self.required_packages();
        if required.is_empty() {
            return self.has_auth_entry();
        }
        let installed = self.packages.installed_packages();
        required.iter().all(|p| installed.contains(p))
    }

    fn probe_status(&self) -> Option<RawStatus> {
        match self.set.probe {
            PackageProbe::FipsProcFile => {
                if self.host.is_container() {
                    return Some(RawStatus::active("fips-container"));
                }
                match fs::read_to_string(&self.fips_proc_file) {
                    Ok(content) if content.trim() == "1" => Some(RawStatus::active("fips-enabled")),
                    Ok(_) => None,
                    Err(_) => Some(RawStatus {
                        state: "installed".to_string(),
                        kernel_supported: None,
                        reboot_required: true,
                    }),
                }
            }
            PackageProbe::KernelFlavor(flavor) => {
                let running = self.host.kernel().runs_flavor(flavor);
                Some(RawStatus {
                    state: if running { flavor.to_string() } else { "installed".to_string() },
                    kernel_supported: None,
                    reboot_required: !running,
                })
            }
        }
    }

    fn indeterminate_reason(&self) -> Option<NamedMessage> {
        match self.set.probe {
            PackageProbe::FipsProcFile => Some(messages::FIPS_PROC_FILE_ERROR.format(&[(
                "file_name",
                &self.fips_proc_file.display().to_string(),
            )])),
            PackageProbe::KernelFlavor(_) => None,
        }
    }

    fn configure(&self, setting: &str, _value: &str, _retry: &RetryPolicy) -> Result<(), ToolError> {
        Err(ToolError::Unsupported(format!(
            "{} has no configurable setting {}",
            self.title, setting
        )))
    }

    fn attach(&self, token: &str) -> Result<(), ToolError> {
        let required = self.required_packages();
        // Containers have no package marker; conditional upgrades always run there
        let rotate_only = !required.is_empty() && self.is_installed();
        self.write_auth_entry(Some(token))?;
        if rotate_only {
            debug!("{} packages already installed, credential refreshed", self.title);
            return Ok(());
        }

        self.events.info(
            &messages::INSTALLING_PACKAGES
                .format(&[("title", self.title)])
                .msg,
        );
        self.release_holds()?;
        self.packages.refresh_lists()?;
        if !required.is_empty() {
            self.packages.install(&required, &self.apt_retry)?;
        }
        self.install_conditional();
        Ok(())
    }

    fn detach(&self) -> Result<(), ToolError> {
        let installed = self.packages.installed_packages();
        let remove: Vec<String> = self
            .required_packages()
            .into_iter()
            .filter(|p| installed.contains(p))
            .collect();
        if !remove.is_empty() {
            self.packages.remove(&remove)?;
        }
        self.write_auth_entry(None)
    }
}
