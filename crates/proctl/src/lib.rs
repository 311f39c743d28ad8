//! proctl - command-line client for subscription services
//!
//! The binary is a thin shell; parsing and commands live here so the
//! integration tests can reach them.

pub mod cli;
pub mod commands;
pub mod errors;
pub mod session;
