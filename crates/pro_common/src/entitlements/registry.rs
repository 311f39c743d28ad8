//! Name-keyed lookup for entitlement definitions
//!
//! Populated once at process start and passed explicitly to whatever needs
//! to resolve one entitlement's reference to another.

use super::{catalog, Entitlement};
use crate::errors::RegistryError;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct EntitlementRegistry {
    entitlements: BTreeMap<&'static str, Entitlement>,
}

impl EntitlementRegistry {
    /// Build a registry, rejecting duplicates and dangling references
    pub fn new(entitlements: Vec<Entitlement>) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for ent in entitlements {
            if map.contains_key(ent.name) {
                return Err(RegistryError::Duplicate(ent.name.to_string()));
            }
            map.insert(ent.name, ent);
        }

        for ent in map.values() {
            for reference in ent.incompatible_names() {
                if !map.contains_key(reference) {
                    return Err(RegistryError::UnknownReference {
                        entitlement: ent.name.to_string(),
                        reference: reference.to_string(),
                    });
                }
            }
        }

        Ok(Self { entitlements: map })
    }

    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(catalog::builtin())
    }

    pub fn get(&self, name: &str) -> Option<&Entitlement> {
        self.entitlements.get(name)
    }

    /// Entitlements in name order
    pub fn iter(&self) -> impl Iterator<Item = &Entitlement> {
        self.entitlements.values()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entitlements.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entitlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entitlements.is_empty()
    }
}
