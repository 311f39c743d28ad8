//! snapd wrapper

use crate::errors::ProcessError;
use crate::system::{subp, which, RetryPolicy};
use regex::Regex;
use std::sync::OnceLock;

pub const SNAP_CMD: &str = "/usr/bin/snap";
pub const SNAPD_PACKAGE: &str = "snapd";

/// snapd operations needed to deliver snap-packaged service tools
pub trait Snapd: Send + Sync {
    /// Whether the snap command exists
    fn has_snap_command(&self) -> bool;

    /// Block until snapd has finished seeding
    fn wait_seeded(&self) -> Result<(), ProcessError>;

    fn configure_proxy(
        &self,
        http_proxy: Option<&str>,
        https_proxy: Option<&str>,
        retry: &RetryPolicy,
    ) -> Result<(), ProcessError>;

    fn install(&self, snap: &str, retry: &RetryPolicy) -> Result<(), ProcessError>;
}

/// The snap CLI on the local machine
#[derive(Debug, Clone, Default)]
pub struct Snap;

impl Snapd for Snap {
    fn has_snap_command(&self) -> bool {
        which(SNAP_CMD).is_some()
    }

    fn wait_seeded(&self) -> Result<(), ProcessError> {
        subp(&[SNAP_CMD, "wait", "system", "seed.loaded"], true, &RetryPolicy::none()).map(|_| ())
    }

    fn configure_proxy(
        &self,
        http_proxy: Option<&str>,
        https_proxy: Option<&str>,
        retry: &RetryPolicy,
    ) -> Result<(), ProcessError> {
        let settings: Vec<String> = [("proxy.http", http_proxy), ("proxy.https", https_proxy)]
            .iter()
            .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, v)))
            .collect();
        if settings.is_empty() {
            return Ok(());
        }
        let mut cmd = vec![SNAP_CMD, "set", "system"];
        cmd.extend(settings.iter().map(|s| s.as_str()));
        subp(&cmd, true, retry).map(|_| ())
    }

    fn install(&self, snap: &str, retry: &RetryPolicy) -> Result<(), ProcessError> {
        subp(&[SNAP_CMD, "install", snap], true, retry).map(|_| ())
    }
}

/// Old snapd releases lack `snap wait`
pub fn is_unknown_wait_command(err: &ProcessError) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"unknown command .*wait").expect("static regex"));
    pattern.is_match(&err.to_string().to_lowercase())
}
