//! Disable command

use crate::errors::{exit_code, NOT_ATTACHED, EXIT_FAILURE};
use crate::session::Session;
use anyhow::Result;
use pro_common::ContractCache;

pub fn run(session: &Session, services: &[String]) -> Result<i32> {
    if !session.contract.is_attached() {
        eprintln!("{}", NOT_ATTACHED);
        return Ok(EXIT_FAILURE);
    }

    let mut all_ok = true;
    for name in services {
        match session.engine.disable(name) {
            Ok(true) => {}
            Ok(false) => {
                all_ok = false;
                eprintln!("Could not disable {}.", name);
            }
            Err(e) => {
                all_ok = false;
                eprintln!("Could not disable {}: {}", name, e);
            }
        }
    }
    Ok(exit_code(all_ok))
}
