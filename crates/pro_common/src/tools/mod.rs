//! Service-specific tooling
//!
//! Each entitlement is backed by one `ServiceTool`. The engine only ever
//! talks to a service through this trait, so status is always read from
//! the tool itself.

pub mod livepatch;
pub mod packages;

pub use livepatch::LivepatchCli;
pub use packages::PackageServiceTool;

use crate::apt::PackageManager;
use crate::config::Config;
use crate::entitlements::{EntitlementRegistry, ServiceKind};
use crate::errors::ToolError;
use crate::events::EventSink;
use crate::messages::NamedMessage;
use crate::system::{HostProbe, RetryPolicy};
use crate::types::RawStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub trait ServiceTool: Send + Sync {
    /// Name used in operator messages
    fn tool_name(&self) -> &str;

    fn is_installed(&self) -> bool;

    /// Runtime state, `None` when it cannot be determined
    fn probe_status(&self) -> Option<RawStatus>;

    /// Tool-specific explanation for an indeterminate probe
    fn indeterminate_reason(&self) -> Option<NamedMessage> {
        None
    }

    fn configure(&self, setting: &str, value: &str, retry: &RetryPolicy) -> Result<(), ToolError>;

    /// Activate the service with `token`
    fn attach(&self, token: &str) -> Result<(), ToolError>;

    fn detach(&self) -> Result<(), ToolError>;
}

pub type ToolMap = HashMap<String, Arc<dyn ServiceTool>>;

/// Real tooling for every entitlement in `registry`
pub fn build_tools(
    registry: &EntitlementRegistry,
    config: &Config,
    packages: Arc<dyn PackageManager>,
    host: Arc<dyn HostProbe>,
    events: Arc<dyn EventSink>,
) -> ToolMap {
    let mut tools: ToolMap = HashMap::new();
    let auth_lock = Arc::new(Mutex::new(()));
    for ent in registry.iter() {
        let tool: Arc<dyn ServiceTool> = match ent.kind {
            ServiceKind::SnapTool { command, .. } => Arc::new(LivepatchCli::new(command)),
            ServiceKind::AptPackages(set) => Arc::new(PackageServiceTool::new(
                ent.title,
                set,
                packages.clone(),
                host.clone(),
                events.clone(),
                config,
            )
            .with_auth_lock(auth_lock.clone())),
        };
        tools.insert(ent.name.to_string(), tool);
    }
    tools
}
