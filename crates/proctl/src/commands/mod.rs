//! Command implementations

pub mod apply_deltas;
pub mod disable;
pub mod enable;
pub mod status;
