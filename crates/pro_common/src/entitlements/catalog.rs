//! Built-in entitlements

use super::{
    AffordanceCheck, ConditionalPackages, DirectivePhase, DirectiveSpec, Entitlement,
    IncompatibleService, PackageProbe, PackageSet, ServiceKind, StaticAffordance,
};
use crate::messages;

pub const LIVEPATCH: &str = "livepatch";
pub const FIPS: &str = "fips";
pub const FIPS_UPDATES: &str = "fips-updates";
pub const REALTIME_KERNEL: &str = "realtime-kernel";

const FIPS_TITLES: &[(&str, &str)] = &[("fips", "FIPS"), ("fips_updates", "FIPS Updates")];

/// Packages whose holds block a FIPS install
const FIPS_PACKAGE_HOLDS: &[&str] = &[
    "fips-initramfs",
    "fips-initramfs-generic",
    "libgcrypt20",
    "libgcrypt20-hmac",
    "libssl1.0.0",
    "libssl1.0.0-hmac",
    "libssl1.1",
    "libssl1.1-hmac",
    "linux-fips",
    "openssh-client",
    "openssh-client-hmac",
    "openssh-server",
    "openssh-server-hmac",
    "openssl",
    "strongswan",
    "strongswan-hmac",
];

pub fn livepatch() -> Entitlement {
    Entitlement {
        name: LIVEPATCH,
        title: "Livepatch",
        description: "Canonical Livepatch service",
        help_url: "https://ubuntu.com/security/livepatch",
        kind: ServiceKind::SnapTool {
            snap: "canonical-livepatch",
            command: "/snap/bin/canonical-livepatch",
        },
        affordances: vec![
            StaticAffordance::new(
                messages::LIVEPATCH_ERROR_INSTALL_ON_CONTAINER,
                AffordanceCheck::Container,
                false,
            ),
            StaticAffordance::new(
                messages::LIVEPATCH_ERROR_WHEN_FIPS_ENABLED,
                AffordanceCheck::ServiceEnabled(FIPS),
                false,
            ),
        ],
        incompatible: vec![
            IncompatibleService {
                name: FIPS,
                message: messages::LIVEPATCH_INVALIDATES_FIPS,
            },
            IncompatibleService {
                name: REALTIME_KERNEL,
                message: messages::REALTIME_LIVEPATCH_INCOMPATIBLE,
            },
        ],
        directives: vec![
            DirectiveSpec {
                key: "caCerts",
                setting: "ca-certs",
                phase: DirectivePhase::TrustMaterial,
                trim_trailing_slash: false,
            },
            DirectiveSpec {
                key: "remoteServer",
                setting: "remote-server",
                phase: DirectivePhase::Endpoint,
                trim_trailing_slash: true,
            },
        ],
        incremental_directives: vec!["caCerts", "remoteServer"],
        error_hints: vec![
            ("Unknown Auth-Token", "Invalid Auth-Token provided to livepatch."),
            ("unsupported kernel", "Your running kernel is not supported by Livepatch."),
        ],
        reattach_on_token_change: true,
        check_contract_affordances: false,
        records_once_enabled: false,
    }
}

fn fips_package_set(repo_url: &'static str) -> PackageSet {
    PackageSet {
        repo_url,
        packages: &["ubuntu-fips"],
        conditional: ConditionalPackages::Fips,
        holds: FIPS_PACKAGE_HOLDS,
        skip_packages_in_container: true,
        probe: PackageProbe::FipsProcFile,
    }
}

fn fips_cloud_affordance() -> StaticAffordance {
    StaticAffordance::new(
        messages::FIPS_BLOCK_ON_CLOUD,
        AffordanceCheck::FipsAllowedOnCloud,
        true,
    )
}

pub fn fips() -> Entitlement {
    Entitlement {
        name: FIPS,
        title: "FIPS",
        description: "NIST-certified core packages",
        help_url: "https://ubuntu.com/security/certifications#fips",
        kind: ServiceKind::AptPackages(fips_package_set("https://esm.ubuntu.com/fips/ubuntu")),
        affordances: vec![
            fips_cloud_affordance(),
            StaticAffordance::new(
                messages::FIPS_ERROR_WHEN_FIPS_UPDATES_ENABLED,
                AffordanceCheck::ServiceEnabled(FIPS_UPDATES),
                false,
            )
            .with_args(FIPS_TITLES),
            StaticAffordance::new(
                messages::FIPS_ERROR_WHEN_FIPS_UPDATES_ONCE_ENABLED,
                AffordanceCheck::ServiceOnceEnabled(FIPS_UPDATES),
                false,
            )
            .with_args(FIPS_TITLES),
        ],
        incompatible: vec![
            IncompatibleService {
                name: LIVEPATCH,
                message: messages::LIVEPATCH_INVALIDATES_FIPS,
            },
            IncompatibleService {
                name: FIPS_UPDATES,
                message: messages::FIPS_UPDATES_INVALIDATES_FIPS,
            },
            IncompatibleService {
                name: REALTIME_KERNEL,
                message: messages::REALTIME_FIPS_INCOMPATIBLE,
            },
        ],
        directives: Vec::new(),
        incremental_directives: Vec::new(),
        error_hints: Vec::new(),
        reattach_on_token_change: false,
        check_contract_affordances: true,
        records_once_enabled: false,
    }
}

pub fn fips_updates() -> Entitlement {
    Entitlement {
        name: FIPS_UPDATES,
        title: "FIPS Updates",
        description: "NIST-certified core packages with priority security updates",
        help_url: "https://ubuntu.com/security/certifications#fips",
        kind: ServiceKind::AptPackages(fips_package_set(
            "https://esm.ubuntu.com/fips-updates/ubuntu",
        )),
        affordances: vec![fips_cloud_affordance()],
        incompatible: vec![
            IncompatibleService {
                name: FIPS,
                message: messages::FIPS_INVALIDATES_FIPS_UPDATES,
            },
            IncompatibleService {
                name: REALTIME_KERNEL,
                message: messages::REALTIME_FIPS_UPDATES_INCOMPATIBLE,
            },
        ],
        directives: Vec::new(),
        incremental_directives: Vec::new(),
        error_hints: Vec::new(),
        reattach_on_token_change: false,
        check_contract_affordances: true,
        records_once_enabled: true,
    }
}

pub fn realtime_kernel() -> Entitlement {
    Entitlement {
        name: REALTIME_KERNEL,
        title: "Real-time kernel",
        description: "Ubuntu kernel with PREEMPT_RT patches integrated",
        help_url: "https://ubuntu.com/realtime-kernel",
        kind: ServiceKind::AptPackages(PackageSet {
            repo_url: "https://esm.ubuntu.com/realtime/ubuntu",
            packages: &["ubuntu-realtime"],
            conditional: ConditionalPackages::None,
            holds: &[],
            skip_packages_in_container: false,
            probe: PackageProbe::KernelFlavor("realtime"),
        }),
        affordances: vec![StaticAffordance::new(
            messages::REALTIME_ERROR_INSTALL_ON_CONTAINER,
            AffordanceCheck::Container,
            false,
        )],
        incompatible: vec![
            IncompatibleService {
                name: FIPS,
                message: messages::REALTIME_FIPS_INCOMPATIBLE,
            },
            IncompatibleService {
                name: FIPS_UPDATES,
                message: messages::REALTIME_FIPS_UPDATES_INCOMPATIBLE,
            },
            IncompatibleService {
                name: LIVEPATCH,
                message: messages::REALTIME_LIVEPATCH_INCOMPATIBLE,
            },
        ],
        directives: Vec::new(),
        incremental_directives: Vec::new(),
        error_hints: Vec::new(),
        reattach_on_token_change: false,
        check_contract_affordances: true,
        records_once_enabled: false,
    }
}

/// Every built-in entitlement, sorted by name
pub fn builtin() -> Vec<Entitlement> {
    vec![fips(), fips_updates(), livepatch(), realtime_kernel()]
}
