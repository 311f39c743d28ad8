//! Affordance Checker
//!
//! Pure query over the host and other services. Predicates are tagged
//! variants evaluated here at check time, so building an entitlement never
//! touches external tooling.

use crate::contract::EntitlementSnapshot;
use crate::entitlements::{AffordanceCheck, Entitlement, StaticAffordance};
use crate::messages::{self, NamedMessage};
use crate::system::HostProbe;
use crate::types::ApplicationStatus;
use tracing::debug;

const GCP_FIPS_PACKAGE: &str = "ubuntu-gcp-fips";
const GCP_FIPS_SERIES: &[&str] = &["bionic", "focal"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffordanceResult {
    Ok,
    Blocked(NamedMessage),
}

impl AffordanceResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// What affordance predicates may look at
pub trait AffordanceContext {
    fn host(&self) -> &dyn HostProbe;
    /// Current status of another service, probed from its tool
    fn service_status(&self, name: &str) -> ApplicationStatus;
    fn was_once_enabled(&self, name: &str) -> bool;
    fn allow_default_fips_metapackage_on_gcp(&self) -> bool;
}

/// Contract restrictions first, then static affordances in declaration
/// order; the first mismatch wins.
pub fn check_affordances(
    ent: &Entitlement,
    snapshot: Option<&EntitlementSnapshot>,
    ctx: &dyn AffordanceContext,
) -> AffordanceResult {
    if ent.check_contract_affordances {
        if let Some(blocked) = snapshot.and_then(|s| check_contract(ent, s, ctx.host())) {
            return AffordanceResult::Blocked(blocked);
        }
    }

    for affordance in &ent.affordances {
        let result = evaluate(affordance.check, snapshot, ctx);
        if result != affordance.expected {
            debug!(
                "{} blocked by {:?} (got {}, expected {})",
                ent.name, affordance.check, result, affordance.expected
            );
            return AffordanceResult::Blocked(blocked_message(affordance, ctx.host()));
        }
    }
    AffordanceResult::Ok
}

fn check_contract(
    ent: &Entitlement,
    snapshot: &EntitlementSnapshot,
    host: &dyn HostProbe,
) -> Option<NamedMessage> {
    let affordances = &snapshot.affordances;
    if !affordances.architectures.is_empty() {
        let arch = host.arch();
        if !affordances.architectures.contains(&arch) {
            return Some(messages::INAPPLICABLE_ARCH.format(&[
                ("title", ent.title),
                ("arch", &arch),
                ("supported_arches", &affordances.architectures.join(", ")),
            ]));
        }
    }
    if !affordances.series.is_empty() {
        let series = host.series();
        if !affordances.series.contains(&series) {
            return Some(
                messages::INAPPLICABLE_SERIES.format(&[("title", ent.title), ("series", &series)]),
            );
        }
    }
    None
}

/// Dispatch table for deferred predicates
fn evaluate(
    check: AffordanceCheck,
    snapshot: Option<&EntitlementSnapshot>,
    ctx: &dyn AffordanceContext,
) -> bool {
    match check {
        AffordanceCheck::Container => ctx.host().is_container(),
        AffordanceCheck::ServiceEnabled(name) => ctx.service_status(name).is_active(),
        AffordanceCheck::ServiceOnceEnabled(name) => ctx.was_once_enabled(name),
        AffordanceCheck::FipsAllowedOnCloud => fips_allowed_on_cloud(snapshot, ctx),
    }
}

fn fips_allowed_on_cloud(snapshot: Option<&EntitlementSnapshot>, ctx: &dyn AffordanceContext) -> bool {
    if ctx.host().cloud_id().as_deref() != Some("gce") {
        return true;
    }
    if ctx.allow_default_fips_metapackage_on_gcp() {
        return true;
    }
    let series = ctx.host().series();
    if GCP_FIPS_SERIES.iter().any(|s| *s == series) {
        return true;
    }
    snapshot
        .map(|s| s.additional_packages().iter().any(|p| p == GCP_FIPS_PACKAGE))
        .unwrap_or(false)
}

fn cloud_title(cloud_id: &str) -> String {
    match cloud_id {
        "aws" => "an AWS".to_string(),
        "azure" => "an Azure".to_string(),
        "gce" => "a GCP".to_string(),
        other => other.to_string(),
    }
}

/// "jammy" -> "Jammy"
fn title_case(series: &str) -> String {
    let mut chars = series.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn blocked_message(affordance: &StaticAffordance, host: &dyn HostProbe) -> NamedMessage {
    let mut args: Vec<(&str, String)> = affordance
        .message_args
        .iter()
        .map(|(k, v)| (*k, v.to_string()))
        .collect();
    if affordance.check == AffordanceCheck::FipsAllowedOnCloud {
        args.push(("series", title_case(&host.series())));
        args.push(("cloud", cloud_title(&host.cloud_id().unwrap_or_default())));
    }
    let borrowed: Vec<(&str, &str)> = args.iter().map(|(k, v)| (*k, v.as_str())).collect();
    affordance.message.format(&borrowed)
}
