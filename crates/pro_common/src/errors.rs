//! Error types for the pro client.

use thiserror::Error;

/// A subprocess exited non-zero or could not be spawned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed running command '{cmd}' [exit({exit_code})]. Message: {stderr}")]
pub struct ProcessError {
    pub cmd: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessError {
    pub fn new(cmd: &[&str], exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            cmd: cmd.join(" "),
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.trim().to_string(),
        }
    }

    /// Spawn failures have no exit code; -1 mirrors a missing binary
    pub fn spawn_failed(cmd: &[&str], err: &std::io::Error) -> Self {
        Self::new(cmd, -1, "", &err.to_string())
    }
}

/// Failure of a service-specific tool operation
#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unsupported(String),
}

/// Required tooling could not be installed
///
/// Kept apart from `ToolError` so operators can tell environment problems
/// from a service declining to enable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error("Failed to install snapd on the system")]
    CannotInstallSnapd,

    #[error("{snap_cmd} is present but snapd is not installed; cannot enable {service}")]
    SnapdNotProperlyInstalled { snap_cmd: String, service: String },

    #[error("Unable to install {service}: {detail}")]
    ToolInstall { service: String, detail: String },

    #[error("Could not install packages: {}: {detail}", packages.join(", "))]
    Packages { packages: Vec<String>, detail: String },
}

/// Entitlement catalog inconsistencies, caught at registry construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate entitlement name: {0}")]
    Duplicate(String),

    #[error("{entitlement} references unknown incompatible service {reference}")]
    UnknownReference {
        entitlement: String,
        reference: String,
    },

    #[error("no service tool registered for {0}")]
    MissingTool(String),
}

/// Failures the engine cannot turn into a structured outcome
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown service: {0}")]
    UnknownEntitlement(String),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ToolError> for EngineError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Process(e) => EngineError::Process(e),
            ToolError::Io(e) => EngineError::Io(e),
            ToolError::Unsupported(msg) => EngineError::Config(msg),
        }
    }
}
