//! Persistent client state outside the contract cache

use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Services that have been enabled at least once on this machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicesOnceEnabled {
    #[serde(default)]
    pub services: BTreeMap<String, DateTime<Utc>>,
}

/// Store for the once-enabled markers
pub trait OnceEnabledStore: Send + Sync {
    fn was_once_enabled(&self, name: &str) -> bool;

    fn mark_enabled(&self, name: &str) -> Result<(), EngineError>;
}

/// JSON file backed store
#[derive(Debug, Clone)]
pub struct OnceEnabledFile {
    path: PathBuf,
}

impl OnceEnabledFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<ServicesOnceEnabled, EngineError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ServicesOnceEnabled::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, data: &ServicesOnceEnabled) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(data)?)?;
        Ok(())
    }
}

impl OnceEnabledStore for OnceEnabledFile {
    fn was_once_enabled(&self, name: &str) -> bool {
        self.read()
            .map(|data| data.services.contains_key(name))
            .unwrap_or(false)
    }

    fn mark_enabled(&self, name: &str) -> Result<(), EngineError> {
        let mut data = self.read()?;
        data.services.entry(name.to_string()).or_insert_with(Utc::now);
        self.write(&data)
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryOnceEnabled {
    names: Mutex<Vec<String>>,
}

impl MemoryOnceEnabled {
    pub fn with(names: &[&str]) -> Self {
        Self {
            names: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
        }
    }
}

impl OnceEnabledStore for MemoryOnceEnabled {
    fn was_once_enabled(&self, name: &str) -> bool {
        self.names
            .lock()
            .map(|n| n.iter().any(|s| s == name))
            .unwrap_or(false)
    }

    fn mark_enabled(&self, name: &str) -> Result<(), EngineError> {
        if let Ok(mut names) = self.names.lock() {
            if !names.iter().any(|s| s == name) {
                names.push(name.to_string());
            }
        }
        Ok(())
    }
}
