//! Apply a contract change to one service

use crate::errors::EXIT_SUCCESS;
use crate::session::Session;
use anyhow::{Context, Result};
use pro_common::{Delta, EntitlementSnapshot};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub fn run(
    session: &Session,
    service: &str,
    original: &Path,
    delta: &Path,
    allow_enable: bool,
) -> Result<i32> {
    let original: EntitlementSnapshot = read_json(original)?;
    let delta: Delta = read_json(delta)?;

    let mutated = session
        .engine
        .process_contract_deltas(service, &original, &delta, allow_enable)
        .with_context(|| format!("Failed to process contract changes for {}", service))?;

    if mutated {
        println!("{}: changes applied", service);
    } else {
        println!("{}: nothing to do", service);
    }
    Ok(EXIT_SUCCESS)
}
