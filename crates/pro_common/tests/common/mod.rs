//! Shared scenario harness: recording fakes for every engine collaborator
#![allow(dead_code)]

use pro_common::apt::PackageManager;
use pro_common::config::RetriesConfig;
use pro_common::engine::EngineOptions;
use pro_common::entitlements::catalog;
use pro_common::events::RecordingEvents;
use pro_common::snap::Snapd;
use pro_common::state_files::{MemoryOnceEnabled, OnceEnabledFile, OnceEnabledStore};
use pro_common::system::{HostProbe, RetryPolicy};
use pro_common::tools::{ServiceTool, ToolMap};
use pro_common::types::{KernelInfo, RawStatus};
use pro_common::{
    EntitlementRegistry, EntitlementSnapshot, Environment, LifecycleEngine, MachineTokenFile,
    ProcessError, ToolError,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const MACHINE_TOKEN: &str = "machine-tok";

/// Every collaborator call, in order, across all fakes
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Calls that start with `prefix`
    pub fn calls_for(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

#[derive(Debug, Default)]
struct ToolState {
    installed: bool,
    active: bool,
    indeterminate: bool,
    reboot_required: bool,
    kernel_supported: Option<bool>,
    fail_attach: Option<String>,
    fail_configure: Option<String>,
    fail_detach: bool,
}

/// Service tool whose state lives in memory
pub struct ScenarioTool {
    name: String,
    log: CallLog,
    state: Mutex<ToolState>,
}

impl ScenarioTool {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            state: Mutex::new(ToolState {
                kernel_supported: Some(true),
                ..Default::default()
            }),
        }
    }

    fn with(self, f: impl FnOnce(&mut ToolState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn enabled(self) -> Self {
        self.with(|s| {
            s.installed = true;
            s.active = true;
        })
    }

    /// Installed, but the status probe cannot tell
    pub fn indeterminate(self) -> Self {
        self.with(|s| {
            s.installed = true;
            s.indeterminate = true;
        })
    }

    pub fn unsupported_kernel(self) -> Self {
        self.with(|s| s.kernel_supported = Some(false))
    }

    pub fn reboot_required(self) -> Self {
        self.with(|s| s.reboot_required = true)
    }

    pub fn failing_attach(self, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.with(|s| s.fail_attach = Some(stderr))
    }

    pub fn failing_configure(self, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.with(|s| s.fail_configure = Some(stderr))
    }

    pub fn failing_detach(self) -> Self {
        self.with(|s| s.fail_detach = true)
    }

    fn failure(&self, verb: &str, stderr: &str) -> ToolError {
        ToolError::Process(ProcessError::new(&[self.name.as_str(), verb], 1, "", stderr))
    }
}

impl ServiceTool for ScenarioTool {
    fn tool_name(&self) -> &str {
        &self.name
    }

    fn is_installed(&self) -> bool {
        self.state.lock().unwrap().installed
    }

    fn probe_status(&self) -> Option<RawStatus> {
        let state = self.state.lock().unwrap();
        if state.indeterminate || !state.active {
            return None;
        }
        Some(RawStatus {
            state: "applied".to_string(),
            kernel_supported: state.kernel_supported,
            reboot_required: state.reboot_required,
        })
    }

    fn configure(&self, setting: &str, value: &str, _retry: &RetryPolicy) -> Result<(), ToolError> {
        self.log
            .push(format!("{} configure {}={}", self.name, setting, value));
        match &self.state.lock().unwrap().fail_configure {
            Some(stderr) => Err(self.failure("config", stderr)),
            None => Ok(()),
        }
    }

    fn attach(&self, token: &str) -> Result<(), ToolError> {
        self.log.push(format!("{} attach {}", self.name, token));
        let mut state = self.state.lock().unwrap();
        if let Some(stderr) = state.fail_attach.clone() {
            return Err(self.failure("enable", &stderr));
        }
        state.installed = true;
        state.active = true;
        state.indeterminate = false;
        Ok(())
    }

    fn detach(&self) -> Result<(), ToolError> {
        self.log.push(format!("{} detach", self.name));
        let mut state = self.state.lock().unwrap();
        if state.fail_detach {
            return Err(self.failure("disable", "device busy"));
        }
        state.installed = false;
        state.active = false;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioHost {
    pub series: String,
    pub arch: String,
    pub container: bool,
    pub cloud: Option<String>,
    pub kernel: String,
}

impl Default for ScenarioHost {
    fn default() -> Self {
        Self {
            series: "jammy".to_string(),
            arch: "amd64".to_string(),
            container: false,
            cloud: None,
            kernel: "5.15.0-88-generic".to_string(),
        }
    }
}

impl HostProbe for ScenarioHost {
    fn is_container(&self) -> bool {
        self.container
    }

    fn series(&self) -> String {
        self.series.clone()
    }

    fn arch(&self) -> String {
        self.arch.clone()
    }

    fn kernel(&self) -> KernelInfo {
        KernelInfo::from_release(&self.kernel)
    }

    fn cloud_id(&self) -> Option<String> {
        self.cloud.clone()
    }
}

pub struct ScenarioPackages {
    log: CallLog,
    installed: Mutex<Vec<String>>,
    fail_install: bool,
}

impl PackageManager for ScenarioPackages {
    fn refresh_lists(&self) -> Result<(), ProcessError> {
        self.log.push("apt update");
        Ok(())
    }

    fn install(&self, packages: &[String], _retry: &RetryPolicy) -> Result<(), ProcessError> {
        self.log.push(format!("apt install {}", packages.join(" ")));
        if self.fail_install {
            return Err(ProcessError::new(
                &["apt-get", "install"],
                100,
                "",
                "E: Unable to locate package",
            ));
        }
        self.installed.lock().unwrap().extend(packages.iter().cloned());
        Ok(())
    }

    fn remove(&self, packages: &[String]) -> Result<(), ProcessError> {
        self.log.push(format!("apt remove {}", packages.join(" ")));
        self.installed
            .lock()
            .unwrap()
            .retain(|p| !packages.contains(p));
        Ok(())
    }

    fn installed_packages(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }

    fn held_packages(&self) -> Result<Vec<String>, ProcessError> {
        Ok(Vec::new())
    }

    fn unhold(&self, _packages: &[String]) -> Result<(), ProcessError> {
        Ok(())
    }
}

pub struct ScenarioSnapd {
    log: CallLog,
    /// The snap command appears once snapd is installed through apt
    packages: Arc<ScenarioPackages>,
    preinstalled_command: bool,
    wait_stderr: Option<String>,
}

impl Snapd for ScenarioSnapd {
    fn has_snap_command(&self) -> bool {
        self.preinstalled_command || self.packages.is_installed("snapd")
    }

    fn wait_seeded(&self) -> Result<(), ProcessError> {
        self.log.push("snap wait");
        match &self.wait_stderr {
            Some(stderr) => Err(ProcessError::new(&["snap", "wait"], 1, "", stderr)),
            None => Ok(()),
        }
    }

    fn configure_proxy(
        &self,
        http_proxy: Option<&str>,
        https_proxy: Option<&str>,
        _retry: &RetryPolicy,
    ) -> Result<(), ProcessError> {
        if http_proxy.is_some() || https_proxy.is_some() {
            self.log.push(format!(
                "snap proxy {} {}",
                http_proxy.unwrap_or("-"),
                https_proxy.unwrap_or("-")
            ));
        }
        Ok(())
    }

    fn install(&self, snap: &str, _retry: &RetryPolicy) -> Result<(), ProcessError> {
        self.log.push(format!("snap install {}", snap));
        Ok(())
    }
}

/// Contract access in the backend's JSON shape
pub fn access(value: Value) -> EntitlementSnapshot {
    serde_json::from_value(value).unwrap()
}

/// Entitled livepatch with both directives set
pub fn livepatch_access(token: &str) -> EntitlementSnapshot {
    access(json!({
        "entitlement": {
            "entitled": true,
            "directives": {
                "caCerts": "-----BEGIN CERT-----",
                "remoteServer": "https://livepatch.example.com/"
            }
        },
        "resourceToken": token
    }))
}

pub fn entitled_access(token: &str) -> EntitlementSnapshot {
    access(json!({
        "entitlement": {"entitled": true},
        "resourceToken": token
    }))
}

pub struct BedBuilder {
    log: CallLog,
    host: ScenarioHost,
    tools: HashMap<String, ScenarioTool>,
    contract: BTreeMap<String, EntitlementSnapshot>,
    snap_command: bool,
    snapd_package: bool,
    apt_fails: bool,
    wait_stderr: Option<String>,
    once_enabled: Option<MemoryOnceEnabled>,
    options: EngineOptions,
}

impl BedBuilder {
    pub fn host(mut self, f: impl FnOnce(&mut ScenarioHost)) -> Self {
        f(&mut self.host);
        self
    }

    pub fn tool(mut self, name: &str, f: impl FnOnce(ScenarioTool) -> ScenarioTool) -> Self {
        let tool = f(ScenarioTool::new(name, &self.log));
        self.tools.insert(name.to_string(), tool);
        self
    }

    pub fn entitled(mut self, name: &str, snapshot: EntitlementSnapshot) -> Self {
        self.contract.insert(name.to_string(), snapshot);
        self
    }

    /// No snap command and no snapd package on the machine
    pub fn without_snapd(mut self) -> Self {
        self.snap_command = false;
        self.snapd_package = false;
        self
    }

    /// The snap command exists but the snapd package does not
    pub fn broken_snapd(mut self) -> Self {
        self.snap_command = true;
        self.snapd_package = false;
        self
    }

    pub fn apt_fails(mut self) -> Self {
        self.apt_fails = true;
        self
    }

    pub fn snap_wait_fails(mut self, stderr: &str) -> Self {
        self.wait_stderr = Some(stderr.to_string());
        self
    }

    /// Keep once-enabled markers in memory, seeded with `names`
    pub fn once_enabled(mut self, names: &[&str]) -> Self {
        self.once_enabled = Some(MemoryOnceEnabled::with(names));
        self
    }

    pub fn options(mut self, f: impl FnOnce(&mut EngineOptions)) -> Self {
        f(&mut self.options);
        self
    }

    pub fn build(self) -> Bed {
        let dir = TempDir::new().unwrap();
        let events = Arc::new(RecordingEvents::new());
        let packages = Arc::new(ScenarioPackages {
            log: self.log.clone(),
            installed: Mutex::new(if self.snapd_package {
                vec!["snapd".to_string()]
            } else {
                Vec::new()
            }),
            fail_install: self.apt_fails,
        });
        let snapd = Arc::new(ScenarioSnapd {
            log: self.log.clone(),
            packages: packages.clone(),
            preinstalled_command: self.snap_command,
            wait_stderr: self.wait_stderr,
        });

        let mut tools = self.tools;
        for ent in catalog::builtin() {
            tools
                .entry(ent.name.to_string())
                .or_insert_with(|| ScenarioTool::new(ent.name, &self.log));
        }
        let tools: HashMap<String, Arc<ScenarioTool>> =
            tools.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        let tool_map: ToolMap = tools
            .iter()
            .map(|(k, v)| (k.clone(), v.clone() as Arc<dyn ServiceTool>))
            .collect();

        let once_enabled: Arc<dyn OnceEnabledStore> = match self.once_enabled {
            Some(store) => Arc::new(store),
            None => Arc::new(OnceEnabledFile::new(
                dir.path().join("services-once-enabled.json"),
            )),
        };

        let contract = MachineTokenFile {
            machine_token: Some(MACHINE_TOKEN.to_string()),
            entitlements: self.contract,
        };

        let env = Environment {
            registry: EntitlementRegistry::builtin().unwrap(),
            contract: Arc::new(contract),
            host: Arc::new(self.host),
            packages,
            snapd,
            events: events.clone(),
            once_enabled,
            tools: tool_map,
        };

        Bed {
            engine: LifecycleEngine::new(env, self.options).unwrap(),
            log: self.log,
            events,
            tools,
            _dir: dir,
        }
    }
}

/// An engine wired to recording fakes
pub struct Bed {
    pub engine: LifecycleEngine,
    pub log: CallLog,
    pub events: Arc<RecordingEvents>,
    pub tools: HashMap<String, Arc<ScenarioTool>>,
    _dir: TempDir,
}

impl Bed {
    pub fn builder() -> BedBuilder {
        BedBuilder {
            log: CallLog::default(),
            host: ScenarioHost::default(),
            tools: HashMap::new(),
            contract: BTreeMap::new(),
            snap_command: true,
            snapd_package: true,
            apt_fails: false,
            wait_stderr: None,
            once_enabled: None,
            options: EngineOptions {
                retries: RetriesConfig::none(),
                ..EngineOptions::default()
            },
        }
    }

    pub fn tool(&self, name: &str) -> &ScenarioTool {
        &self.tools[name]
    }
}
