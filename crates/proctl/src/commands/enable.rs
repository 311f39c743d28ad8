//! Enable command

use crate::errors::{exit_code, NOT_ATTACHED, EXIT_FAILURE};
use crate::session::Session;
use anyhow::Result;
use pro_common::ContractCache;
use tracing::warn;

pub fn run(session: &Session, services: &[String]) -> Result<i32> {
    if !session.contract.is_attached() {
        eprintln!("{}", NOT_ATTACHED);
        return Ok(EXIT_FAILURE);
    }

    let mut all_ok = true;
    for name in services {
        match session.engine.enable(name) {
            Ok(outcome) if outcome.success => {}
            Ok(outcome) => {
                all_ok = false;
                if let Some(reason) = outcome.human_reason() {
                    eprintln!("{}", reason);
                }
            }
            Err(e) => {
                all_ok = false;
                warn!("enable {} aborted: {}", name, e);
                eprintln!("Could not enable {}: {}", name, e);
            }
        }
    }
    Ok(exit_code(all_ok))
}
