//! Core status types shared by the engine, tools and CLI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authoritative local state of a service, as observed from its tooling.
///
/// Never cached beyond a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Enabled,
    Disabled,
    Pending,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Pending => "pending",
        }
    }

    /// Enabled, or installed and waiting on a reboot
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-side lifecycle state for one entitlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Unknown,
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Disabled => "disabled",
            Self::Enabling => "enabling",
            Self::Enabled => "enabled",
            Self::Disabling => "disabling",
        }
    }

    /// Transitional states must never be observed once an operation returns
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Enabling | Self::Disabling)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a service tool reports when its runtime probe succeeds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatus {
    /// Tool-specific state label (e.g. "applied", "fips-enabled")
    pub state: String,
    /// Whether the running kernel is supported, when the tool knows
    pub kernel_supported: Option<bool>,
    /// Installed but not active until the next boot
    pub reboot_required: bool,
}

impl RawStatus {
    pub fn active(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            ..Default::default()
        }
    }
}

/// Running kernel details used for warnings and contract affordances
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelInfo {
    pub uname_release: String,
}

impl KernelInfo {
    pub fn from_release(release: &str) -> Self {
        Self {
            uname_release: release.to_string(),
        }
    }

    /// Flavor match anywhere past the version, so `1040-intel-iotg-realtime`
    /// runs `realtime`
    pub fn runs_flavor(&self, flavor: &str) -> bool {
        self.uname_release
            .splitn(3, '-')
            .nth(2)
            .map(|suffix| suffix.split('-').any(|part| part == flavor))
            .unwrap_or(false)
    }
}
