//! Compatibility Resolver

use crate::entitlements::{Entitlement, EntitlementRegistry};
use crate::messages::NamedMessage;
use crate::types::ApplicationStatus;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Enable,
    Disable,
}

/// A conflicting service that stays enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    pub name: &'static str,
    pub title: &'static str,
    pub reason: NamedMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Conflicting services to disable before enabling
    pub auto_disable: Vec<&'static str>,
    pub blocking: Vec<Blocker>,
}

impl Resolution {
    pub fn is_clear(&self) -> bool {
        self.auto_disable.is_empty() && self.blocking.is_empty()
    }
}

/// Sort every active incompatible service into auto-disable or blocking
///
/// `status_of` must probe the other service's tool. All conflicts are
/// reported; none is silently picked.
pub fn resolve<F>(
    ent: &Entitlement,
    action: Action,
    registry: &EntitlementRegistry,
    mut status_of: F,
    allow_auto_disable: bool,
) -> Resolution
where
    F: FnMut(&str) -> ApplicationStatus,
{
    let mut resolution = Resolution::default();
    if action == Action::Disable {
        return resolution;
    }

    for incompatible in &ent.incompatible {
        let other = match registry.get(incompatible.name) {
            Some(other) => other,
            None => {
                warn!("{} lists unknown incompatible service {}", ent.name, incompatible.name);
                continue;
            }
        };
        let status = status_of(other.name);
        debug!("{} conflicts with {} ({})", ent.name, other.name, status);
        if !status.is_active() {
            continue;
        }
        if allow_auto_disable {
            resolution.auto_disable.push(other.name);
        } else {
            resolution.blocking.push(Blocker {
                name: other.name,
                title: other.title,
                reason: incompatible.message.message(),
            });
        }
    }
    resolution
}
