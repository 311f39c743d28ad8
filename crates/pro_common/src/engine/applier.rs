//! Config Applier
//!
//! Pushes a snapshot's directives and token into the service tool.
//! Trust material always goes in before endpoint rewrites. There is no
//! retry across the sequence; only individual tool calls carry a retry
//! policy.

use crate::contract::EntitlementSnapshot;
use crate::entitlements::Entitlement;
use crate::errors::ToolError;
use crate::messages::{self, NamedMessage};
use crate::system::RetryPolicy;
use crate::tools::ServiceTool;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    Applied,
    Failed(NamedMessage),
}

impl ApplyResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Everything `apply` needs besides the snapshot
pub struct ApplyContext<'a> {
    pub ent: &'a Entitlement,
    pub tool: &'a dyn ServiceTool,
    /// Machine-wide fallback credential
    pub machine_token: Option<&'a str>,
    /// Whether the service is currently active, for re-attach
    pub currently_active: bool,
    /// Retry policy for tool configuration calls
    pub retry: &'a RetryPolicy,
}

/// Error text an operator should see
///
/// For subprocess failures that is what the tool printed, not our command
/// line (which may carry a token).
pub fn tool_error_text(err: &ToolError) -> String {
    match err {
        ToolError::Process(e) if !e.stderr.is_empty() => e.stderr.clone(),
        ToolError::Process(e) if !e.stdout.trim().is_empty() => e.stdout.trim().to_string(),
        ToolError::Process(e) => format!("exit status {}", e.exit_code),
        other => other.to_string(),
    }
}

pub fn apply(
    ctx: &ApplyContext<'_>,
    snapshot: &EntitlementSnapshot,
    apply_directives: bool,
    apply_token: bool,
) -> ApplyResult {
    let ent = ctx.ent;

    if apply_directives {
        for spec in ent.ordered_directives() {
            let raw = match snapshot.directive_str(spec.key) {
                Some(value) => value,
                None => continue,
            };
            let value = if spec.trim_trailing_slash {
                raw.strip_suffix('/').unwrap_or(raw)
            } else {
                raw
            };
            if value.is_empty() {
                continue;
            }
            debug!("Setting {} {} for {}", spec.setting, spec.key, ent.name);
            if let Err(e) = ctx.tool.configure(spec.setting, value, ctx.retry) {
                return ApplyResult::Failed(messages::UNABLE_TO_CONFIGURE.format(&[
                    ("title", ent.title),
                    ("error", &ent.classify_error(&tool_error_text(&e))),
                ]));
            }
        }
    }

    if apply_token {
        let token = match snapshot
            .resource_token
            .as_deref()
            .or(ctx.machine_token)
            .filter(|t| !t.is_empty())
        {
            Some(token) => token,
            None => {
                return ApplyResult::Failed(
                    messages::NO_TOKEN_AVAILABLE.format(&[("title", ent.title)]),
                )
            }
        };

        if ent.reattach_on_token_change && ctx.currently_active {
            info!("Detaching {} before attaching with new token", ent.name);
            if let Err(e) = ctx.tool.detach() {
                return ApplyResult::Failed(messages::UNABLE_TO_ENABLE.format(&[
                    ("title", ent.title),
                    ("error", &ent.classify_error(&tool_error_text(&e))),
                ]));
            }
        }

        if let Err(e) = ctx.tool.attach(token) {
            return ApplyResult::Failed(messages::UNABLE_TO_ENABLE.format(&[
                ("title", ent.title),
                ("error", &ent.classify_error(&tool_error_text(&e))),
            ]));
        }
    }

    ApplyResult::Applied
}
