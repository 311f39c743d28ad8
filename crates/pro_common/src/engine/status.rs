//! Status Evaluator
//!
//! Status comes from interrogating the tool on every call. A probe that
//! cannot tell reports DISABLED: better to say "not protected" than to
//! claim protection we cannot see. Warnings never change the status.

use crate::entitlements::Entitlement;
use crate::messages::{self, NamedMessage};
use crate::system::HostProbe;
use crate::tools::ServiceTool;
use crate::types::{ApplicationStatus, RawStatus};
use serde::Serialize;

/// One evaluation of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: ApplicationStatus,
    /// Why the service is not enabled, or an advisory when it is
    pub warning: Option<NamedMessage>,
    /// Replaces the entitlement description in status output
    pub description_override: Option<NamedMessage>,
}

/// Installed/enabled determination only
pub fn application_status(
    ent: &Entitlement,
    tool: &dyn ServiceTool,
) -> (ApplicationStatus, Option<NamedMessage>, Option<RawStatus>) {
    if !tool.is_installed() {
        return (
            ApplicationStatus::Disabled,
            Some(messages::SERVICE_NOT_ENABLED.format(&[("title", ent.title)])),
            None,
        );
    }
    match tool.probe_status() {
        None => {
            let reason = tool.indeterminate_reason().unwrap_or_else(|| {
                messages::CLIENT_FAILURE.format(&[("tool", tool.tool_name())])
            });
            (ApplicationStatus::Disabled, Some(reason), None)
        }
        Some(raw) if raw.reboot_required => (
            ApplicationStatus::Pending,
            Some(messages::REBOOT_REQUIRED.format(&[("title", ent.title)])),
            Some(raw),
        ),
        Some(raw) => (ApplicationStatus::Enabled, None, Some(raw)),
    }
}

/// Advisory check for an ENABLED service
pub fn warning_status(raw: &RawStatus, host: &dyn HostProbe) -> Option<NamedMessage> {
    match raw.kernel_supported {
        Some(false) => {
            let kernel = host.kernel();
            Some(messages::KERNEL_NOT_SUPPORTED.format(&[
                ("version", &kernel.uname_release),
                ("arch", &host.arch()),
            ]))
        }
        _ => None,
    }
}

/// Shorter description for services running in a degraded mode
pub fn description_override(raw: &RawStatus, host: &dyn HostProbe) -> Option<NamedMessage> {
    if raw.kernel_supported == Some(false) && !host.is_container() {
        Some(messages::KERNEL_NOT_SUPPORTED_DESCRIPTION.message())
    } else {
        None
    }
}

pub fn evaluate(ent: &Entitlement, tool: &dyn ServiceTool, host: &dyn HostProbe) -> StatusReport {
    let (status, reason, raw) = application_status(ent, tool);
    match raw {
        Some(raw) if status == ApplicationStatus::Enabled => StatusReport {
            status,
            warning: warning_status(&raw, host),
            description_override: description_override(&raw, host),
        },
        _ => StatusReport {
            status,
            warning: reason,
            description_override: None,
        },
    }
}
