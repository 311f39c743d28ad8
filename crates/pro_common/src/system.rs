//! System layer - subprocess execution and host facts
//!
//! Every external command the client runs goes through `subp`, which
//! captures exit code and output and hands failures back as a
//! `ProcessError` without reinterpreting them. Retries are opt-in per call
//! and only wrap that single subprocess.

use crate::errors::ProcessError;
use crate::types::KernelInfo;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed backoff sequence; one retry per entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryPolicy {
    pub sleeps: Vec<Duration>,
}

impl RetryPolicy {
    /// Single attempt
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_secs(secs: &[f64]) -> Self {
        Self {
            sleeps: secs
                .iter()
                .filter(|s| s.is_finite() && **s >= 0.0)
                .map(|s| Duration::from_secs_f64(*s))
                .collect(),
        }
    }

    /// Total attempts, including the first
    pub fn attempts(&self) -> usize {
        self.sleeps.len() + 1
    }

    /// Run `op` until it succeeds or the sleeps are exhausted
    pub fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: std::fmt::Display,
    {
        let mut sleeps = self.sleeps.iter();
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => match sleeps.next() {
                    Some(sleep) => {
                        debug!("{} failed, retrying in {:?}: {}", what, sleep, err);
                        thread::sleep(*sleep);
                    }
                    None => return Err(err),
                },
            }
        }
    }
}

/// Run a command, retrying per `retry`
///
/// With `capture` the command's stdout is returned; otherwise it is passed
/// through to the terminal and an empty string is returned. Stderr is
/// always captured so failures can be classified.
pub fn subp(cmd: &[&str], capture: bool, retry: &RetryPolicy) -> Result<String, ProcessError> {
    retry.run(&cmd.join(" "), || subp_once(cmd, capture))
}

fn subp_once(cmd: &[&str], capture: bool) -> Result<String, ProcessError> {
    let (program, args) = match cmd.split_first() {
        Some(split) => split,
        None => return Err(ProcessError::new(cmd, -1, "", "empty command")),
    };

    debug!("Running command: {}", cmd.join(" "));
    let stdout = if capture { Stdio::piped() } else { Stdio::inherit() };
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ProcessError::spawn_failed(cmd, &e))?;

    let out = String::from_utf8_lossy(&output.stdout).to_string();
    let err = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        Ok(out)
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        Err(ProcessError::new(cmd, exit_code, &out, &err))
    }
}

/// Locate an executable on PATH
pub fn which(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Whether we run with root privileges
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Host facts consulted by affordances and status warnings
pub trait HostProbe: Send + Sync {
    fn is_container(&self) -> bool;

    /// Release codename, e.g. "jammy"
    fn series(&self) -> String;

    /// Package architecture, e.g. "amd64"
    fn arch(&self) -> String;

    fn kernel(&self) -> KernelInfo;

    /// Cloud identifier reported by cloud-init ("aws", "azure", "gce", ...)
    fn cloud_id(&self) -> Option<String>;
}

/// The machine we are running on
#[derive(Debug, Clone)]
pub struct LocalHost {
    cloud_id_file: PathBuf,
}

impl LocalHost {
    pub fn new(cloud_id_file: impl Into<PathBuf>) -> Self {
        Self {
            cloud_id_file: cloud_id_file.into(),
        }
    }
}

impl HostProbe for LocalHost {
    fn is_container(&self) -> bool {
        if let Ok(out) = Command::new("systemd-detect-virt")
            .args(["--quiet", "--container"])
            .status()
        {
            return out.success();
        }
        ["/run/container_type", "/run/systemd/container"]
            .iter()
            .any(|p| Path::new(p).exists())
    }

    fn series(&self) -> String {
        fs::read_to_string("/etc/os-release")
            .map(|content| parse_os_release_codename(&content))
            .unwrap_or_default()
    }

    fn arch(&self) -> String {
        match subp(&["dpkg", "--print-architecture"], true, &RetryPolicy::none()) {
            Ok(out) => out.trim().to_string(),
            Err(e) => {
                warn!("Could not read dpkg architecture: {}", e);
                std::env::consts::ARCH.to_string()
            }
        }
    }

    fn kernel(&self) -> KernelInfo {
        let release = fs::read_to_string("/proc/sys/kernel/osrelease").unwrap_or_default();
        KernelInfo::from_release(release.trim())
    }

    fn cloud_id(&self) -> Option<String> {
        fs::read_to_string(&self.cloud_id_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Extract VERSION_CODENAME from /etc/os-release content
pub fn parse_os_release_codename(content: &str) -> String {
    content
        .lines()
        .find_map(|line| line.strip_prefix("VERSION_CODENAME="))
        .map(|v| v.trim_matches('"').to_string())
        .unwrap_or_default()
}
