//! canonical-livepatch CLI wrapper

use super::ServiceTool;
use crate::errors::{ProcessError, ToolError};
use crate::system::{subp, which, RetryPolicy};
use crate::types::RawStatus;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct StatusDoc {
    #[serde(rename = "Status", default)]
    status: Vec<KernelStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct KernelStatus {
    #[serde(rename = "Livepatch", default)]
    livepatch: Option<PatchState>,
    #[serde(rename = "Supported", default)]
    supported: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PatchState {
    #[serde(rename = "State", default)]
    state: String,
}

/// Parse `canonical-livepatch status --format json` output
pub fn parse_status(json: &str) -> Option<RawStatus> {
    let doc: StatusDoc = match serde_json::from_str(json) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Unparseable livepatch status: {}", e);
            return None;
        }
    };
    let first = doc.status.into_iter().next()?;
    let kernel_supported = match first.supported.as_deref() {
        Some("supported") => Some(true),
        Some("unsupported") => Some(false),
        _ => None,
    };
    Some(RawStatus {
        state: first
            .livepatch
            .map(|l| l.state)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        kernel_supported,
        reboot_required: false,
    })
}

#[derive(Debug, Clone)]
pub struct LivepatchCli {
    command: String,
}

impl LivepatchCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn run(&self, args: &[&str], capture: bool, retry: &RetryPolicy) -> Result<String, ProcessError> {
        let mut cmd = vec![self.command.as_str()];
        cmd.extend_from_slice(args);
        subp(&cmd, capture, retry)
    }
}

impl ServiceTool for LivepatchCli {
    fn tool_name(&self) -> &str {
        "canonical-livepatch"
    }

    fn is_installed(&self) -> bool {
        which(&self.command).is_some()
    }

    fn probe_status(&self) -> Option<RawStatus> {
        match self.run(&["status", "--verbose", "--format", "json"], true, &RetryPolicy::none()) {
            Ok(out) => parse_status(&out),
            Err(e) => {
                debug!("canonical-livepatch status failed: {}", e);
                None
            }
        }
    }

    fn configure(&self, setting: &str, value: &str, retry: &RetryPolicy) -> Result<(), ToolError> {
        let arg = format!("{}={}", setting, value);
        self.run(&["config", &arg], true, retry)?;
        Ok(())
    }

    fn attach(&self, token: &str) -> Result<(), ToolError> {
        self.run(&["enable", token], true, &RetryPolicy::none())?;
        Ok(())
    }

    fn detach(&self) -> Result<(), ToolError> {
        self.run(&["disable"], true, &RetryPolicy::none())?;
        Ok(())
    }
}
