//! Entitlement lifecycle engine
//!
//! Leaves first: affordance checks, compatibility resolution, config
//! application, status evaluation and delta reconciliation. The
//! `LifecycleEngine` composes them into enable, disable, status and
//! delta processing.

pub mod affordance;
pub mod applier;
pub mod compat;
pub mod deltas;
pub mod lifecycle;
pub mod status;

#[cfg(test)]
pub(crate) mod fakes;

pub use affordance::AffordanceResult;
pub use applier::ApplyResult;
pub use compat::{Action, Resolution};
pub use deltas::ReconcileAction;
pub use lifecycle::{EnableFailure, EnableOutcome, LifecycleEngine};
pub use status::StatusReport;

use crate::apt::PackageManager;
use crate::config::{Config, RetriesConfig};
use crate::contract::ContractCache;
use crate::entitlements::EntitlementRegistry;
use crate::errors::RegistryError;
use crate::events::EventSink;
use crate::snap::Snapd;
use crate::state_files::OnceEnabledStore;
use crate::system::HostProbe;
use crate::tools::{ServiceTool, ToolMap};
use std::sync::Arc;

/// Collaborators the engine talks to
///
/// Everything external sits behind a trait so scenarios can run against
/// recording fakes.
pub struct Environment {
    pub registry: EntitlementRegistry,
    pub contract: Arc<dyn ContractCache>,
    pub host: Arc<dyn HostProbe>,
    pub packages: Arc<dyn PackageManager>,
    pub snapd: Arc<dyn Snapd>,
    pub events: Arc<dyn EventSink>,
    pub once_enabled: Arc<dyn OnceEnabledStore>,
    pub tools: ToolMap,
}

impl Environment {
    /// Every registered entitlement must have a tool
    pub fn validate(&self) -> Result<(), RegistryError> {
        for name in self.registry.names() {
            if !self.tools.contains_key(name) {
                return Err(RegistryError::MissingTool(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn tool(&self, name: &str) -> Option<&Arc<dyn ServiceTool>> {
        self.tools.get(name)
    }
}

/// Operator policy for one engine instance
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Disable conflicting services instead of refusing to enable
    pub allow_auto_disable: bool,
    pub allow_default_fips_metapackage_on_gcp: bool,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub retries: RetriesConfig,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            allow_auto_disable: config.features.allow_auto_disable,
            allow_default_fips_metapackage_on_gcp: config
                .features
                .allow_default_fips_metapackage_on_gcp,
            http_proxy: config.http_proxy.clone(),
            https_proxy: config.https_proxy.clone(),
            retries: config.retries.clone(),
        }
    }
}
