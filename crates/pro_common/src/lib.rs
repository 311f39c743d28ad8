//! Pro Common - entitlement lifecycle engine and host plumbing
//!
//! Enables, disables and reconciles subscription-backed services
//! (Livepatch, FIPS, Real-time kernel) against the cached contract.
//! Status always comes from the service tooling itself.

pub mod apt;
pub mod config;
pub mod contract;
pub mod engine;
pub mod entitlements;
pub mod errors;
pub mod events;
pub mod messages;
pub mod snap;
pub mod state_files;
pub mod system;
pub mod tools;
pub mod types;

pub use config::Config;
pub use contract::{ContractCache, Delta, EntitlementSnapshot, MachineTokenFile};
pub use engine::{
    EnableFailure, EnableOutcome, EngineOptions, Environment, LifecycleEngine, StatusReport,
};
pub use entitlements::{Entitlement, EntitlementRegistry};
pub use errors::{EngineError, InstallError, ProcessError, RegistryError, ToolError};
pub use messages::NamedMessage;
pub use types::{ApplicationStatus, LifecycleState};
