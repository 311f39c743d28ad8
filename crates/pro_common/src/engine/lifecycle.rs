//! Lifecycle Engine
//!
//! Per-entitlement state machine:
//!
//! ```text
//! UNKNOWN/DISABLED -> ENABLING -> ENABLED | DISABLED
//! any              -> DISABLING -> DISABLED
//! ```
//!
//! Transitional states never outlive the call that entered them. Enabling
//! one service can disable another, so every operation takes the
//! operation locks of its entitlement and all of its incompatible
//! services, always in name order.

use super::affordance::{self, AffordanceContext, AffordanceResult};
use super::applier::{self, ApplyContext, ApplyResult};
use super::compat::{self, Action, Blocker};
use super::deltas::{self, ReconcileAction};
use super::status::{self, StatusReport};
use super::{EngineOptions, Environment};
use crate::contract::{Delta, EntitlementSnapshot};
use crate::entitlements::{Entitlement, ServiceKind};
use crate::errors::{EngineError, InstallError, RegistryError};
use crate::messages::{self, NamedMessage};
use crate::snap::{is_unknown_wait_command, SNAPD_PACKAGE, SNAP_CMD};
use crate::system::HostProbe;
use crate::tools::ServiceTool;
use crate::types::{ApplicationStatus, LifecycleState};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Why an enable attempt did not go through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableFailure {
    NotEntitled(NamedMessage),
    AlreadyEnabled(NamedMessage),
    /// An affordance did not hold
    Blocked(NamedMessage),
    Incompatible {
        title: &'static str,
        blockers: Vec<Blocker>,
    },
    AutoDisableFailed(NamedMessage),
    Install(InstallError),
    Apply(NamedMessage),
}

impl EnableFailure {
    /// Affordance, compatibility and entitlement failures
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotEntitled(_)
                | Self::AlreadyEnabled(_)
                | Self::Blocked(_)
                | Self::Incompatible { .. }
        )
    }
}

impl fmt::Display for EnableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEntitled(msg)
            | Self::AlreadyEnabled(msg)
            | Self::Blocked(msg)
            | Self::AutoDisableFailed(msg)
            | Self::Apply(msg) => write!(f, "{}", msg),
            Self::Install(err) => write!(f, "{}", err),
            Self::Incompatible { title, blockers } => {
                let lines: Vec<String> = blockers
                    .iter()
                    .map(|b| {
                        let head = messages::INCOMPATIBLE_SERVICE
                            .format(&[("title", *title), ("incompatible", b.title)]);
                        format!("{}\n{}", head, b.reason)
                    })
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
        }
    }
}

/// Result of `enable`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableOutcome {
    pub success: bool,
    pub reason: Option<EnableFailure>,
}

impl EnableOutcome {
    fn enabled() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    fn failed(reason: EnableFailure) -> Self {
        Self {
            success: false,
            reason: Some(reason),
        }
    }

    pub fn human_reason(&self) -> Option<String> {
        self.reason.as_ref().map(|r| r.to_string())
    }
}

pub struct LifecycleEngine {
    env: Environment,
    options: EngineOptions,
    states: Mutex<HashMap<String, LifecycleState>>,
    op_locks: HashMap<String, Mutex<()>>,
}

impl LifecycleEngine {
    pub fn new(env: Environment, options: EngineOptions) -> Result<Self, RegistryError> {
        env.validate()?;
        let names = env.registry.names();
        Ok(Self {
            states: Mutex::new(
                names
                    .iter()
                    .map(|n| (n.to_string(), LifecycleState::Unknown))
                    .collect(),
            ),
            op_locks: names
                .iter()
                .map(|n| (n.to_string(), Mutex::new(())))
                .collect(),
            env,
            options,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Last state the engine drove this entitlement to
    pub fn state(&self, name: &str) -> LifecycleState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or_default()
    }

    fn set_state(&self, name: &str, state: LifecycleState) {
        debug!("{} -> {}", name, state);
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), state);
    }

    fn resolve(&self, name: &str) -> Result<(&Entitlement, Arc<dyn ServiceTool>), EngineError> {
        let ent = self
            .env
            .registry
            .get(name)
            .ok_or_else(|| EngineError::UnknownEntitlement(name.to_string()))?;
        let tool = self
            .env
            .tool(name)
            .cloned()
            .ok_or_else(|| RegistryError::MissingTool(name.to_string()))?;
        Ok((ent, tool))
    }

    /// Operation locks for `ent` and everything it may auto-disable
    fn lock_family(&self, ent: &Entitlement) -> Vec<MutexGuard<'_, ()>> {
        let mut names: Vec<&str> = std::iter::once(ent.name)
            .chain(ent.incompatible_names())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
            .into_iter()
            .filter_map(|n| self.op_locks.get(n))
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }

    fn lock_one(&self, name: &str) -> Option<MutexGuard<'_, ()>> {
        self.op_locks
            .get(name)
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn status_of(&self, name: &str) -> ApplicationStatus {
        match (self.env.registry.get(name), self.env.tool(name)) {
            (Some(ent), Some(tool)) => status::application_status(ent, tool.as_ref()).0,
            _ => ApplicationStatus::Disabled,
        }
    }

    pub fn status(&self, name: &str) -> Result<(ApplicationStatus, Option<NamedMessage>), EngineError> {
        let report = self.status_report(name)?;
        Ok((report.status, report.warning))
    }

    /// Status plus description override, for status output
    pub fn status_report(&self, name: &str) -> Result<StatusReport, EngineError> {
        let (ent, tool) = self.resolve(name)?;
        Ok(status::evaluate(ent, tool.as_ref(), self.env.host.as_ref()))
    }

    pub fn enable(&self, name: &str) -> Result<EnableOutcome, EngineError> {
        let (ent, tool) = self.resolve(name)?;
        let _guards = self.lock_family(ent);
        self.enable_locked(ent, tool.as_ref())
    }

    fn enable_locked(
        &self,
        ent: &Entitlement,
        tool: &dyn ServiceTool,
    ) -> Result<EnableOutcome, EngineError> {
        let snapshot = match self.env.contract.snapshot(ent.name) {
            Some(snapshot) if snapshot.entitled => snapshot,
            _ => {
                return Ok(EnableOutcome::failed(EnableFailure::NotEntitled(
                    messages::NOT_ENTITLED.format(&[("title", ent.title)]),
                )))
            }
        };

        if status::application_status(ent, tool).0.is_active() {
            self.set_state(ent.name, LifecycleState::Enabled);
            return Ok(EnableOutcome::failed(EnableFailure::AlreadyEnabled(
                messages::ALREADY_ENABLED.format(&[("title", ent.title)]),
            )));
        }

        self.set_state(ent.name, LifecycleState::Enabling);
        match self.run_enable(ent, tool, &snapshot) {
            Ok(None) => {
                self.set_state(ent.name, LifecycleState::Enabled);
                info!("{} enabled", ent.name);
                self.env
                    .events
                    .info(&messages::SERVICE_ENABLED.format(&[("title", ent.title)]).msg);
                if ent.records_once_enabled {
                    if let Err(e) = self.env.once_enabled.mark_enabled(ent.name) {
                        warn!("Could not record {} as once enabled: {}", ent.name, e);
                    }
                }
                Ok(EnableOutcome::enabled())
            }
            Ok(Some(failure)) => {
                self.set_state(ent.name, LifecycleState::Disabled);
                info!("{} not enabled: {}", ent.name, failure);
                Ok(EnableOutcome::failed(failure))
            }
            Err(e) => {
                self.set_state(ent.name, LifecycleState::Disabled);
                error!("Enabling {} failed: {}", ent.name, e);
                Err(e)
            }
        }
    }

    /// `None` when the service is now enabled
    fn run_enable(
        &self,
        ent: &Entitlement,
        tool: &dyn ServiceTool,
        snapshot: &EntitlementSnapshot,
    ) -> Result<Option<EnableFailure>, EngineError> {
        if let AffordanceResult::Blocked(msg) = affordance::check_affordances(ent, Some(snapshot), self) {
            return Ok(Some(EnableFailure::Blocked(msg)));
        }

        let resolution = compat::resolve(
            ent,
            Action::Enable,
            &self.env.registry,
            |name| self.status_of(name),
            self.options.allow_auto_disable,
        );
        if !resolution.blocking.is_empty() {
            return Ok(Some(EnableFailure::Incompatible {
                title: ent.title,
                blockers: resolution.blocking,
            }));
        }
        for other_name in resolution.auto_disable {
            let (other, other_tool) = self.resolve(other_name)?;
            self.env.events.info(
                &messages::DISABLING_INCOMPATIBLE
                    .format(&[("title", other.title)])
                    .msg,
            );
            let disabled = self.disable_locked(other, other_tool.as_ref())?;
            if !disabled || self.status_of(other.name).is_active() {
                return Ok(Some(EnableFailure::AutoDisableFailed(
                    messages::AUTO_DISABLE_FAILED
                        .format(&[("title", ent.title), ("incompatible", other.title)]),
                )));
            }
        }

        if let Err(e) = self.install_prerequisites(ent, tool) {
            return Ok(Some(EnableFailure::Install(e)));
        }

        let machine_token = self.env.contract.machine_token();
        let retry = self.options.retries.livepatch_policy();
        let ctx = ApplyContext {
            ent,
            tool,
            machine_token: machine_token.as_deref(),
            currently_active: false,
            retry: &retry,
        };
        match applier::apply(&ctx, snapshot, true, true) {
            ApplyResult::Applied => Ok(None),
            ApplyResult::Failed(msg) => Ok(Some(EnableFailure::Apply(msg))),
        }
    }

    fn install_prerequisites(
        &self,
        ent: &Entitlement,
        tool: &dyn ServiceTool,
    ) -> Result<(), InstallError> {
        match ent.kind {
            ServiceKind::SnapTool { snap, .. } => self.install_snap_tool(ent, tool, snap),
            // Package-backed services install while attaching
            ServiceKind::AptPackages(_) => Ok(()),
        }
    }

    fn install_snap_tool(
        &self,
        ent: &Entitlement,
        tool: &dyn ServiceTool,
        snap: &str,
    ) -> Result<(), InstallError> {
        let snapd = &self.env.snapd;
        let packages = &self.env.packages;
        let events = &self.env.events;
        let retries = &self.options.retries;
        let tool_install = |detail: String| InstallError::ToolInstall {
            service: ent.title.to_string(),
            detail,
        };

        if !snapd.has_snap_command() {
            events.info(messages::INSTALLING_SNAPD);
            events.info(messages::APT_UPDATING_LISTS);
            if let Err(e) = packages.refresh_lists() {
                debug!("Trying to install snapd. Ignoring apt-get update failure: {}", e);
            }
            if let Err(e) = packages.install(&[SNAPD_PACKAGE.to_string()], &retries.apt_policy()) {
                warn!("snapd install failed: {}", e);
                return Err(InstallError::CannotInstallSnapd);
            }
        } else if !packages.is_installed(SNAPD_PACKAGE) {
            return Err(InstallError::SnapdNotProperlyInstalled {
                snap_cmd: SNAP_CMD.to_string(),
                service: ent.title.to_string(),
            });
        }

        match snapd.wait_seeded() {
            Ok(()) => {}
            Err(e) if is_unknown_wait_command(&e) => {
                warn!("Detected old snapd without wait command");
                events.info(messages::SNAPD_DOES_NOT_HAVE_WAIT_CMD);
            }
            Err(e) => return Err(tool_install(e.to_string())),
        }

        let http = self.options.http_proxy.as_deref();
        let https = self.options.https_proxy.as_deref();
        snapd
            .configure_proxy(http, https, &retries.snap_install_policy())
            .map_err(|e| tool_install(e.to_string()))?;

        if !tool.is_installed() {
            events.info(
                &messages::INSTALLING_TOOL_SNAP
                    .format(&[("snap", snap)])
                    .msg,
            );
            snapd
                .install(snap, &retries.snap_install_policy())
                .map_err(|e| tool_install(e.to_string()))?;
        }

        let livepatch_retry = retries.livepatch_policy();
        for (setting, value) in [("http-proxy", http), ("https-proxy", https)] {
            if let Some(value) = value {
                tool.configure(setting, value, &livepatch_retry)
                    .map_err(|e| tool_install(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Returns whether the service ended up disabled
    pub fn disable(&self, name: &str) -> Result<bool, EngineError> {
        let (ent, tool) = self.resolve(name)?;
        let _guard = self.lock_one(ent.name);
        self.disable_locked(ent, tool.as_ref())
    }

    fn disable_locked(&self, ent: &Entitlement, tool: &dyn ServiceTool) -> Result<bool, EngineError> {
        self.set_state(ent.name, LifecycleState::Disabling);
        if !tool.is_installed() {
            debug!("{} tooling absent, nothing to disable", ent.name);
            self.set_state(ent.name, LifecycleState::Disabled);
            return Ok(true);
        }

        match tool.detach() {
            Ok(()) => {
                self.set_state(ent.name, LifecycleState::Disabled);
                info!("{} disabled", ent.name);
                self.env
                    .events
                    .info(&messages::SERVICE_DISABLED.format(&[("title", ent.title)]).msg);
                Ok(true)
            }
            Err(e) => {
                error!("Disabling {} failed: {}", ent.name, e);
                self.settle_observed(ent, tool);
                Ok(false)
            }
        }
    }

    /// Record whatever the tool reports after a failed mutation
    fn settle_observed(&self, ent: &Entitlement, tool: &dyn ServiceTool) {
        let observed = status::application_status(ent, tool).0;
        self.set_state(
            ent.name,
            if observed.is_active() {
                LifecycleState::Enabled
            } else {
                LifecycleState::Disabled
            },
        );
    }

    /// Reconcile a contract change; true iff a mutation took place
    pub fn process_contract_deltas(
        &self,
        name: &str,
        original: &EntitlementSnapshot,
        delta: &Delta,
        allow_enable: bool,
    ) -> Result<bool, EngineError> {
        let (ent, tool) = self.resolve(name)?;
        let _guards = self.lock_family(ent);

        let action = deltas::reconcile(
            ent,
            original,
            delta,
            allow_enable,
            || status::application_status(ent, tool.as_ref()).0,
            self.env.events.as_ref(),
        );
        debug!("{} delta action: {:?}", ent.name, action);

        match action {
            ReconcileAction::NoOp => Ok(false),
            ReconcileAction::FullEnable => Ok(self.enable_locked(ent, tool.as_ref())?.success),
            ReconcileAction::Revoke => self.disable_locked(ent, tool.as_ref()),
            ReconcileAction::TargetedApply { directives, token } => {
                info!("Updating '{}' on changed directives.", ent.name);
                let merged = original.merged(delta);
                let machine_token = self.env.contract.machine_token();
                let retry = self.options.retries.livepatch_policy();
                let ctx = ApplyContext {
                    ent,
                    tool: tool.as_ref(),
                    machine_token: machine_token.as_deref(),
                    currently_active: true,
                    retry: &retry,
                };
                match applier::apply(&ctx, &merged, directives, token) {
                    ApplyResult::Applied => {
                        self.set_state(ent.name, LifecycleState::Enabled);
                        Ok(true)
                    }
                    ApplyResult::Failed(msg) => {
                        error!("{}", msg);
                        self.env.events.info(&msg.msg);
                        self.settle_observed(ent, tool.as_ref());
                        Ok(false)
                    }
                }
            }
        }
    }
}

impl AffordanceContext for LifecycleEngine {
    fn host(&self) -> &dyn HostProbe {
        self.env.host.as_ref()
    }

    fn service_status(&self, name: &str) -> ApplicationStatus {
        self.status_of(name)
    }

    fn was_once_enabled(&self, name: &str) -> bool {
        self.env.once_enabled.was_once_enabled(name)
    }

    fn allow_default_fips_metapackage_on_gcp(&self) -> bool {
        self.options.allow_default_fips_metapackage_on_gcp
    }
}
