//! Wires the real host collaborators into a lifecycle engine

use anyhow::{Context, Result};
use pro_common::apt::{Apt, PackageManager};
use pro_common::events::EventSink;
use pro_common::snap::Snap;
use pro_common::state_files::OnceEnabledFile;
use pro_common::system::{HostProbe, LocalHost};
use pro_common::tools::build_tools;
use pro_common::{
    Config, EngineOptions, EntitlementRegistry, Environment, LifecycleEngine, MachineTokenFile,
};
use std::sync::Arc;
use tracing::debug;

pub struct Session {
    pub contract: Arc<MachineTokenFile>,
    pub engine: LifecycleEngine,
}

impl Session {
    /// `assume_yes` authorises automatic conflict resolution for this run
    pub fn open(config: &Config, events: Arc<dyn EventSink>, assume_yes: bool) -> Result<Self> {
        let token_file = config.machine_token_file();
        let contract = Arc::new(
            MachineTokenFile::load(&token_file)
                .with_context(|| format!("Failed to read {}", token_file.display()))?,
        );
        debug!(
            "Loaded contract with {} entitlements",
            contract.entitlements.len()
        );

        let registry = EntitlementRegistry::builtin()?;
        let host: Arc<dyn HostProbe> = Arc::new(LocalHost::new(config.paths.cloud_id_file.clone()));
        let packages: Arc<dyn PackageManager> = Arc::new(Apt::new(config.retries.apt_policy()));
        let tools = build_tools(&registry, config, packages.clone(), host.clone(), events.clone());

        let env = Environment {
            registry,
            contract: contract.clone(),
            host,
            packages,
            snapd: Arc::new(Snap),
            events,
            once_enabled: Arc::new(OnceEnabledFile::new(config.services_once_enabled_file())),
            tools,
        };

        let mut options = EngineOptions::from_config(config);
        if assume_yes {
            options.allow_auto_disable = true;
        }
        let engine = LifecycleEngine::new(env, options)?;
        Ok(Self { contract, engine })
    }
}
