//! Contract snapshots and deltas
//!
//! Both use the contract backend's access shape:
//!
//! ```json
//! {
//!   "entitlement": {
//!     "entitled": true,
//!     "directives": {"caCerts": "...", "remoteServer": "https://..."},
//!     "obligations": {"enabledByDefault": false},
//!     "affordances": {"architectures": ["amd64"], "series": ["jammy"]}
//!   },
//!   "resourceToken": "..."
//! }
//! ```

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Platform restrictions declared by the contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAffordances {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawObligations {
    #[serde(
        rename = "enabledByDefault",
        alias = "enableByDefault",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    enabled_by_default: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawEntitlement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entitled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directives: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    obligations: Option<RawObligations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    affordances: Option<ContractAffordances>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccess {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entitlement: Option<RawEntitlement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_token: Option<String>,
}

/// Locally cached view of one entitlement's contract data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAccess", into = "RawAccess")]
pub struct EntitlementSnapshot {
    pub entitled: bool,
    pub directives: BTreeMap<String, Value>,
    pub resource_token: Option<String>,
    pub enabled_by_default: bool,
    pub affordances: ContractAffordances,
}

impl From<RawAccess> for EntitlementSnapshot {
    fn from(raw: RawAccess) -> Self {
        let ent = raw.entitlement.unwrap_or_default();
        Self {
            entitled: ent.entitled.unwrap_or(false),
            directives: ent.directives.unwrap_or_default(),
            resource_token: raw.resource_token.filter(|t| !t.is_empty()),
            enabled_by_default: ent
                .obligations
                .and_then(|o| o.enabled_by_default)
                .unwrap_or(false),
            affordances: ent.affordances.unwrap_or_default(),
        }
    }
}

impl From<EntitlementSnapshot> for RawAccess {
    fn from(snapshot: EntitlementSnapshot) -> Self {
        RawAccess {
            entitlement: Some(RawEntitlement {
                entitled: Some(snapshot.entitled),
                directives: Some(snapshot.directives),
                obligations: Some(RawObligations {
                    enabled_by_default: Some(snapshot.enabled_by_default),
                }),
                affordances: Some(snapshot.affordances),
            }),
            resource_token: snapshot.resource_token,
        }
    }
}

impl EntitlementSnapshot {
    /// String value of a directive, if present and non-empty
    pub fn directive_str(&self, key: &str) -> Option<&str> {
        self.directives
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Packages the contract adds on top of the service's own set
    pub fn additional_packages(&self) -> Vec<String> {
        self.directives
            .get("additionalPackages")
            .and_then(Value::as_array)
            .map(|pkgs| {
                pkgs.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// This snapshot with `delta` applied on top
    ///
    /// A `null` directive in the delta removes the key.
    pub fn merged(&self, delta: &Delta) -> Self {
        let mut merged = self.clone();
        for (key, value) in &delta.directives {
            if value.is_null() {
                merged.directives.remove(key);
            } else {
                merged.directives.insert(key.clone(), value.clone());
            }
        }
        if let Some(token) = &delta.resource_token {
            merged.resource_token = Some(token.clone());
        }
        if let Some(enabled_by_default) = delta.enabled_by_default {
            merged.enabled_by_default = enabled_by_default;
        }
        if let Some(entitled) = delta.entitled {
            merged.entitled = entitled;
        }
        merged
    }
}

/// Sparse update to an `EntitlementSnapshot`
///
/// Holds only what changed. Consumed once by the delta reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAccess")]
pub struct Delta {
    pub directives: BTreeMap<String, Value>,
    pub resource_token: Option<String>,
    pub enabled_by_default: Option<bool>,
    pub entitled: Option<bool>,
}

impl From<RawAccess> for Delta {
    fn from(raw: RawAccess) -> Self {
        let ent = raw.entitlement.unwrap_or_default();
        Self {
            directives: ent.directives.unwrap_or_default(),
            resource_token: raw.resource_token.filter(|t| !t.is_empty()),
            enabled_by_default: ent.obligations.and_then(|o| o.enabled_by_default),
            entitled: ent.entitled,
        }
    }
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
            && self.resource_token.is_none()
            && self.enabled_by_default.is_none()
            && self.entitled.is_none()
    }

    pub fn with_directive(mut self, key: &str, value: Value) -> Self {
        self.directives.insert(key.to_string(), value);
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.resource_token = Some(token.to_string());
        self
    }

    pub fn with_enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = Some(enabled);
        self
    }
}

/// Read access to the machine's cached contract
pub trait ContractCache: Send + Sync {
    /// Whether the machine holds a machine token at all
    fn is_attached(&self) -> bool {
        self.machine_token().is_some()
    }

    fn snapshot(&self, name: &str) -> Option<EntitlementSnapshot>;

    /// Machine-wide fallback credential
    fn machine_token(&self) -> Option<String>;
}

/// On-disk machine token file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineTokenFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_token: Option<String>,
    #[serde(default)]
    pub entitlements: BTreeMap<String, EntitlementSnapshot>,
}

impl MachineTokenFile {
    /// Load from disk; a missing file means the machine is not attached
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No machine token at {}, treating as unattached", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl ContractCache for MachineTokenFile {
    fn snapshot(&self, name: &str) -> Option<EntitlementSnapshot> {
        self.entitlements.get(name).cloned()
    }

    fn machine_token(&self) -> Option<String> {
        self.machine_token.clone().filter(|t| !t.is_empty())
    }
}
