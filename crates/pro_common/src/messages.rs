//! User-facing messages
//!
//! Every message that can reach an operator carries a stable name so
//! JSON consumers can match on it instead of on the wording.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A message with a stable identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedMessage {
    pub name: String,
    pub msg: String,
}

impl NamedMessage {
    pub fn new(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            msg: msg.into(),
        }
    }
}

impl fmt::Display for NamedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

/// Static message template; `{key}` placeholders are filled by `format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTemplate {
    pub name: &'static str,
    pub tmpl: &'static str,
}

impl MessageTemplate {
    pub const fn new(name: &'static str, tmpl: &'static str) -> Self {
        Self { name, tmpl }
    }

    /// Message with no placeholders
    pub fn message(&self) -> NamedMessage {
        NamedMessage::new(self.name, self.tmpl)
    }

    pub fn format(&self, args: &[(&str, &str)]) -> NamedMessage {
        let mut msg = self.tmpl.to_string();
        for (key, value) in args {
            msg = msg.replace(&format!("{{{}}}", key), value);
        }
        NamedMessage::new(self.name, msg)
    }
}

// Status explanations
pub const SERVICE_NOT_ENABLED: MessageTemplate =
    MessageTemplate::new("service-not-enabled", "{title} is not enabled");
pub const CLIENT_FAILURE: MessageTemplate = MessageTemplate::new(
    "client-failure",
    "{tool} does not appear to be running",
);
pub const KERNEL_NOT_SUPPORTED: MessageTemplate = MessageTemplate::new(
    "livepatch-kernel-not-supported",
    "The current kernel ({version}, {arch}) is not supported by livepatch.",
);
pub const KERNEL_NOT_SUPPORTED_DESCRIPTION: MessageTemplate = MessageTemplate::new(
    "livepatch-kernel-not-supported-description",
    "Current kernel is not supported",
);
pub const REBOOT_REQUIRED: MessageTemplate =
    MessageTemplate::new("reboot-required", "Reboot to activate {title}.");
pub const FIPS_PROC_FILE_ERROR: MessageTemplate = MessageTemplate::new(
    "fips-proc-file-error",
    "{file_name} is not set to 1",
);

// Enable preconditions
pub const NOT_ENTITLED: MessageTemplate = MessageTemplate::new(
    "subscription-not-entitled-to-service",
    "This subscription is not entitled to {title}",
);
pub const ALREADY_ENABLED: MessageTemplate = MessageTemplate::new(
    "service-already-enabled",
    "{title} is already enabled.",
);
pub const INAPPLICABLE_SERIES: MessageTemplate = MessageTemplate::new(
    "inapplicable-series",
    "{title} is not available for Ubuntu {series}.",
);
pub const INAPPLICABLE_ARCH: MessageTemplate = MessageTemplate::new(
    "inapplicable-arch",
    "{title} is not available for platform {arch}.\nSupported platforms are: {supported_arches}.",
);
pub const INCOMPATIBLE_SERVICE: MessageTemplate = MessageTemplate::new(
    "incompatible-service",
    "Cannot enable {title} when {incompatible} is enabled.",
);
pub const AUTO_DISABLE_FAILED: MessageTemplate = MessageTemplate::new(
    "auto-disable-failed",
    "Unable to disable {incompatible} before enabling {title}.",
);
pub const DISABLING_INCOMPATIBLE: MessageTemplate = MessageTemplate::new(
    "disabling-incompatible-service",
    "Disabling incompatible service: {title}",
);

// Affordances
pub const LIVEPATCH_ERROR_INSTALL_ON_CONTAINER: MessageTemplate = MessageTemplate::new(
    "livepatch-error-install-on-container",
    "Cannot install Livepatch on a container.",
);
pub const LIVEPATCH_ERROR_WHEN_FIPS_ENABLED: MessageTemplate = MessageTemplate::new(
    "livepatch-error-when-fips-enabled",
    "Cannot enable Livepatch when FIPS is enabled.",
);
pub const REALTIME_ERROR_INSTALL_ON_CONTAINER: MessageTemplate = MessageTemplate::new(
    "realtime-error-install-on-container",
    "Cannot install Real-time kernel on a container.",
);
pub const FIPS_BLOCK_ON_CLOUD: MessageTemplate = MessageTemplate::new(
    "cloud-non-optimized-fips-kernel",
    "Ubuntu {series} does not provide {cloud} optimized FIPS kernel",
);
pub const FIPS_ERROR_WHEN_FIPS_UPDATES_ENABLED: MessageTemplate = MessageTemplate::new(
    "fips-enable-when-fips-updates-enabled",
    "Cannot enable {fips} when {fips_updates} is enabled.",
);
pub const FIPS_ERROR_WHEN_FIPS_UPDATES_ONCE_ENABLED: MessageTemplate = MessageTemplate::new(
    "fips-enable-when-fips-updates-once-enabled",
    "Cannot enable {fips} because {fips_updates} was once enabled.",
);

// Incompatibility explanations
pub const LIVEPATCH_INVALIDATES_FIPS: MessageTemplate = MessageTemplate::new(
    "livepatch-invalidates-fips",
    "Livepatch cannot be enabled while running the official FIPS certified kernel.",
);
pub const FIPS_UPDATES_INVALIDATES_FIPS: MessageTemplate = MessageTemplate::new(
    "fips-updates-invalidates-fips",
    "FIPS cannot be enabled if FIPS Updates has ever been enabled because FIPS Updates installs security patches that aren't officially certified.",
);
pub const FIPS_INVALIDATES_FIPS_UPDATES: MessageTemplate = MessageTemplate::new(
    "fips-invalidates-fips-updates",
    "FIPS Updates cannot be enabled if FIPS is enabled.",
);
pub const REALTIME_FIPS_INCOMPATIBLE: MessageTemplate = MessageTemplate::new(
    "realtime-fips-incompatible",
    "Realtime and FIPS require different kernels, so you cannot enable both at the same time.",
);
pub const REALTIME_FIPS_UPDATES_INCOMPATIBLE: MessageTemplate = MessageTemplate::new(
    "realtime-fips-updates-incompatible",
    "Realtime and FIPS Updates require different kernels, so you cannot enable both at the same time.",
);
pub const REALTIME_LIVEPATCH_INCOMPATIBLE: MessageTemplate = MessageTemplate::new(
    "realtime-livepatch-incompatible",
    "Livepatch does not yet support the Real-time kernel.",
);

// Progress events
pub const INSTALLING_SNAPD: &str = "Installing snapd";
pub const APT_UPDATING_LISTS: &str = "Updating package lists";
pub const SNAPD_DOES_NOT_HAVE_WAIT_CMD: &str =
    "snapd does not have wait command.\nEnabling Livepatch can fail under this scenario\nPlease, upgrade snapd if Livepatch enable fails and try again.";
pub const INSTALLING_TOOL_SNAP: MessageTemplate =
    MessageTemplate::new("installing-tool-snap", "Installing {snap} snap");
pub const INSTALLING_PACKAGES: MessageTemplate =
    MessageTemplate::new("installing-packages", "Installing {title} packages");
pub const PACKAGE_NOT_AVAILABLE: MessageTemplate = MessageTemplate::new(
    "package-not-available",
    "Could not enable {title} package {pkg}",
);
pub const UNABLE_TO_CONFIGURE: MessageTemplate =
    MessageTemplate::new("unable-to-configure", "Unable to configure {title}: {error}");
pub const UNABLE_TO_ENABLE: MessageTemplate =
    MessageTemplate::new("unable-to-enable", "Unable to enable {title}: {error}");
pub const SERVICE_ENABLED: MessageTemplate =
    MessageTemplate::new("service-enabled", "{title} enabled");
pub const SERVICE_DISABLED: MessageTemplate =
    MessageTemplate::new("service-disabled", "{title} disabled");
pub const ENABLED_BY_DEFAULT_RECOMMENDED: MessageTemplate = MessageTemplate::new(
    "enabled-by-default-recommended",
    "{title} is recommended by default. Run:\nproctl enable {name}",
);
pub const NO_TOKEN_AVAILABLE: MessageTemplate = MessageTemplate::new(
    "no-token-available",
    "No token available to attach {title}",
);

// Installation failures
pub const CANNOT_INSTALL_SNAPD: &str = "Failed to install snapd on the system";
pub const SNAPD_NOT_PROPERLY_INSTALLED: MessageTemplate = MessageTemplate::new(
    "snapd-not-properly-installed",
    "{snap_cmd} is present but snapd is not installed; cannot enable {service}",
);
