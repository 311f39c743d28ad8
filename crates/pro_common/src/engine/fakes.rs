//! Recording stand-ins for unit tests

use crate::errors::{ProcessError, ToolError};
use crate::system::{HostProbe, RetryPolicy};
use crate::tools::ServiceTool;
use crate::types::{KernelInfo, RawStatus};
use std::sync::{Arc, Mutex};

/// Ordered record of tool calls, shareable between tools
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
struct ToolState {
    installed: bool,
    active: bool,
    indeterminate: bool,
    kernel_supported: Option<bool>,
    reboot_required: bool,
    fail_attach: Option<String>,
    fail_configure: Option<String>,
}

pub struct FakeTool {
    name: String,
    log: CallLog,
    state: Mutex<ToolState>,
}

impl FakeTool {
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

    fn update(self, f: impl FnOnce(&mut ToolState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn enabled(self) -> Self {
        self.update(|s| {
            s.installed = true;
            s.active = true;
        })
    }

    pub fn indeterminate(self) -> Self {
        self.update(|s| s.indeterminate = true)
    }

    pub fn kernel_supported(self, supported: Option<bool>) -> Self {
        self.update(|s| s.kernel_supported = supported)
    }

    pub fn reboot_required(self) -> Self {
        self.update(|s| s.reboot_required = true)
    }

    pub fn failing_attach(self, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.update(|s| s.fail_attach = Some(stderr))
    }

    pub fn failing_configure(self, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.update(|s| s.fail_configure = Some(stderr))
    }

    fn failure(&self, verb: &str, stderr: &str) -> ToolError {
        ToolError::Process(ProcessError::new(&[self.name.as_str(), verb], 1, "", stderr))
    }
}

impl ServiceTool for FakeTool {
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
        if let Some(stderr) = &state.fail_attach {
            return Err(self.failure("enable", stderr));
        }
        state.installed = true;
        state.active = true;
        Ok(())
    }

    fn detach(&self) -> Result<(), ToolError> {
        self.log.push(format!("{} detach", self.name));
        let mut state = self.state.lock().unwrap();
        state.installed = false;
        state.active = false;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FakeHost {
    series: String,
    arch: String,
    container: bool,
    cloud: Option<String>,
    kernel: String,
}

impl FakeHost {
    pub fn jammy() -> Self {
        Self {
            series: "jammy".to_string(),
            arch: "amd64".to_string(),
            container: false,
            cloud: None,
            kernel: "5.15.0-88-generic".to_string(),
        }
    }

    pub fn focal() -> Self {
        Self {
            series: "focal".to_string(),
            kernel: "5.4.0-150-generic".to_string(),
            ..Self::jammy()
        }
    }

    pub fn in_container(mut self) -> Self {
        self.container = true;
        self
    }

    pub fn on_cloud(mut self, cloud: &str) -> Self {
        self.cloud = Some(cloud.to_string());
        self
    }

    pub fn with_arch(mut self, arch: &str) -> Self {
        self.arch = arch.to_string();
        self
    }

    pub fn with_kernel(mut self, release: &str) -> Self {
        self.kernel = release.to_string();
        self
    }
}

impl HostProbe for FakeHost {
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
