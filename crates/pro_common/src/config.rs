//! Configuration management for the pro client.
//!
//! Loads settings from /etc/pro/proctl.toml or uses defaults.

use crate::system::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Config file path
pub const CONFIG_PATH: &str = "/etc/pro/proctl.toml";

/// Feature switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    /// Disable incompatible services without asking
    #[serde(default)]
    pub allow_auto_disable: bool,

    /// Allow the generic FIPS metapackage on GCP instances
    #[serde(default)]
    pub allow_default_fips_metapackage_on_gcp: bool,
}

/// Retry sleeps in seconds for known-transient external operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetriesConfig {
    #[serde(default = "default_apt_retries")]
    pub apt: Vec<f64>,

    #[serde(default = "default_snap_install_retries")]
    pub snap_install: Vec<f64>,

    #[serde(default = "default_livepatch_retries")]
    pub livepatch: Vec<f64>,
}

fn default_apt_retries() -> Vec<f64> {
    vec![1.0, 5.0, 10.0]
}

fn default_snap_install_retries() -> Vec<f64> {
    vec![0.5, 1.0, 5.0]
}

fn default_livepatch_retries() -> Vec<f64> {
    vec![0.5, 1.0]
}

impl Default for RetriesConfig {
    fn default() -> Self {
        Self {
            apt: default_apt_retries(),
            snap_install: default_snap_install_retries(),
            livepatch: default_livepatch_retries(),
        }
    }
}

impl RetriesConfig {
    pub fn apt_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(&self.apt)
    }

    pub fn snap_install_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(&self.snap_install)
    }

    pub fn livepatch_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(&self.livepatch)
    }

    /// No sleeps anywhere, for tests and dry environments
    pub fn none() -> Self {
        Self {
            apt: Vec::new(),
            snap_install: Vec::new(),
            livepatch: Vec::new(),
        }
    }
}

/// Host file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_apt_auth_file")]
    pub apt_auth_file: PathBuf,

    #[serde(default = "default_fips_proc_file")]
    pub fips_proc_file: PathBuf,

    #[serde(default = "default_cloud_id_file")]
    pub cloud_id_file: PathBuf,
}

fn default_apt_auth_file() -> PathBuf {
    PathBuf::from("/etc/apt/auth.conf.d/90ubuntu-advantage")
}

fn default_fips_proc_file() -> PathBuf {
    PathBuf::from("/proc/sys/crypto/fips_enabled")
}

fn default_cloud_id_file() -> PathBuf {
    PathBuf::from("/run/cloud-init/cloud-id")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            apt_auth_file: default_apt_auth_file(),
            fips_proc_file: default_fips_proc_file(),
            cloud_id_file: default_cloud_id_file(),
        }
    }
}

/// Full client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root for machine token and state files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub http_proxy: Option<String>,

    #[serde(default)]
    pub https_proxy: Option<String>,

    #[serde(default)]
    pub features: FeaturesConfig,

    #[serde(default)]
    pub retries: RetriesConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/pro")
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            http_proxy: None,
            https_proxy: None,
            features: FeaturesConfig::default(),
            retries: RetriesConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, crate::EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::EngineError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Machine token and cached contract
    pub fn machine_token_file(&self) -> PathBuf {
        self.data_dir.join("private").join("machine-token.json")
    }

    pub fn services_once_enabled_file(&self) -> PathBuf {
        self.data_dir.join("services-once-enabled.json")
    }
}
