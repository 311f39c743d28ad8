//! Entitlement definitions
//!
//! An `Entitlement` is immutable static metadata for one optional service.
//! Cross-entitlement references are by stable name and resolved through
//! the `EntitlementRegistry`, never through direct links.

pub mod catalog;
pub mod registry;

pub use registry::EntitlementRegistry;

use crate::messages::MessageTemplate;

/// Deferred predicate kinds, evaluated through the affordance dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffordanceCheck {
    /// Running inside a container
    Container,
    /// The named service currently reports ENABLED
    ServiceEnabled(&'static str),
    /// The named service has been enabled on this machine before
    ServiceOnceEnabled(&'static str),
    /// The current cloud and series may run the FIPS metapackage
    FipsAllowedOnCloud,
}

/// (message, predicate, expected result)
///
/// The entitlement is blocked when the predicate result differs from
/// `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAffordance {
    pub message: MessageTemplate,
    /// Static placeholder values for `message`
    pub message_args: &'static [(&'static str, &'static str)],
    pub check: AffordanceCheck,
    pub expected: bool,
}

impl StaticAffordance {
    pub const fn new(message: MessageTemplate, check: AffordanceCheck, expected: bool) -> Self {
        Self {
            message,
            message_args: &[],
            check,
            expected,
        }
    }

    pub const fn with_args(self, args: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            message_args: args,
            ..self
        }
    }
}

/// Another entitlement that cannot be enabled alongside this one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompatibleService {
    pub name: &'static str,
    pub message: MessageTemplate,
}

/// Ordering class for directive application
///
/// Trust material is applied before endpoint rewrites: switching the
/// endpoint first could make the tool talk to the new server with stale
/// trust material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DirectivePhase {
    TrustMaterial,
    Endpoint,
}

/// How a contract directive maps onto a tool setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveSpec {
    /// Contract directive key, e.g. "caCerts"
    pub key: &'static str,
    /// Tool setting name, e.g. "ca-certs"
    pub setting: &'static str,
    pub phase: DirectivePhase,
    pub trim_trailing_slash: bool,
}

/// Which extra packages ride along with a package-backed service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalPackages {
    None,
    /// FIPS variants of already-installed crypto packages
    Fips,
}

/// How a package-backed service reports whether it is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageProbe {
    /// Kernel FIPS mode flag in procfs
    FipsProcFile,
    /// Running kernel flavor
    KernelFlavor(&'static str),
}

/// Apt package set delivered from an authenticated repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageSet {
    pub repo_url: &'static str,
    pub packages: &'static [&'static str],
    pub conditional: ConditionalPackages,
    /// Holds that must be released before install
    pub holds: &'static [&'static str],
    /// Skip the required packages inside containers
    pub skip_packages_in_container: bool,
    pub probe: PackageProbe,
}

/// How the service tooling is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// CLI tool shipped as a snap
    SnapTool {
        snap: &'static str,
        command: &'static str,
    },
    AptPackages(PackageSet),
}

/// Static metadata for one optional service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub help_url: &'static str,
    pub kind: ServiceKind,
    /// Evaluated in declaration order
    pub affordances: Vec<StaticAffordance>,
    pub incompatible: Vec<IncompatibleService>,
    pub directives: Vec<DirectiveSpec>,
    /// Directive keys a delta may reapply without a full enable
    pub incremental_directives: Vec<&'static str>,
    /// Ordered (substring, friendly message) pairs for tool errors
    pub error_hints: Vec<(&'static str, &'static str)>,
    /// Token rotation needs detach + attach
    pub reattach_on_token_change: bool,
    /// Enforce the contract's architectures/series lists
    pub check_contract_affordances: bool,
    pub records_once_enabled: bool,
}

impl Entitlement {
    pub fn incompatible_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.incompatible.iter().map(|i| i.name)
    }

    /// Map raw tool error text to a friendlier message
    ///
    /// First matching substring wins; unmatched text is returned as is.
    pub fn classify_error(&self, raw: &str) -> String {
        self.error_hints
            .iter()
            .find(|(pattern, _)| raw.contains(pattern))
            .map(|(_, friendly)| friendly.to_string())
            .unwrap_or_else(|| raw.to_string())
    }

    /// Directives sorted by application phase, declaration order within a phase
    pub fn ordered_directives(&self) -> Vec<&DirectiveSpec> {
        let mut ordered: Vec<&DirectiveSpec> = self.directives.iter().collect();
        ordered.sort_by_key(|d| d.phase);
        ordered
    }
}
