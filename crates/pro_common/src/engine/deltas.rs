//! Delta Reconciler
//!
//! Picks the smallest action that brings an active service in line with a
//! contract change. Disabled services are never touched by a delta alone,
//! except for a first-time enable the contract makes an obligation.

use crate::contract::{Delta, EntitlementSnapshot};
use crate::entitlements::Entitlement;
use crate::events::EventSink;
use crate::messages;
use crate::types::ApplicationStatus;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    NoOp,
    /// Complete enable path, preconditions included
    FullEnable,
    /// The contract no longer entitles an active service
    Revoke,
    TargetedApply { directives: bool, token: bool },
}

impl ReconcileAction {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }
}

/// Directive keys in `delta` that this entitlement can reapply in place
pub fn changed_incremental_directives<'a>(
    ent: &Entitlement,
    original: &EntitlementSnapshot,
    delta: &'a Delta,
) -> Vec<&'a str> {
    delta
        .directives
        .iter()
        .filter(|(key, value)| {
            ent.incremental_directives.iter().any(|k| *k == key.as_str())
                && original.directives.get(key.as_str()) != Some(*value)
        })
        .map(|(key, _)| key.as_str())
        .collect()
}

/// Decide what a delta requires
///
/// `status_of` is only called once the obligation check has passed, so a
/// FullEnable never probes the tool here.
pub fn reconcile<F>(
    ent: &Entitlement,
    original: &EntitlementSnapshot,
    delta: &Delta,
    allow_enable: bool,
    status_of: F,
    events: &dyn EventSink,
) -> ReconcileAction
where
    F: FnOnce() -> ApplicationStatus,
{
    let newly_enabled_by_default =
        delta.enabled_by_default == Some(true) && !original.enabled_by_default;
    if newly_enabled_by_default {
        if allow_enable {
            debug!("{} is now enabled by default", ent.name);
            return ReconcileAction::FullEnable;
        }
        events.info(
            &messages::ENABLED_BY_DEFAULT_RECOMMENDED
                .format(&[("title", ent.title), ("name", ent.name)])
                .msg,
        );
    }

    let status = status_of();
    if status == ApplicationStatus::Disabled {
        return ReconcileAction::NoOp;
    }

    if delta.entitled == Some(false) {
        info!("{} is no longer entitled", ent.name);
        return ReconcileAction::Revoke;
    }

    let directives = !changed_incremental_directives(ent, original, delta).is_empty();
    let token = delta
        .resource_token
        .as_deref()
        .map(|t| !t.is_empty() && original.resource_token.as_deref() != Some(t))
        .unwrap_or(false);

    if directives || token {
        ReconcileAction::TargetedApply { directives, token }
    } else {
        ReconcileAction::NoOp
    }
}
