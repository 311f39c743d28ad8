//! End-to-end lifecycle scenarios against recording fakes

mod common;

use common::{access, entitled_access, livepatch_access, Bed, MACHINE_TOKEN};
use pro_common::engine::EnableFailure;
use pro_common::errors::InstallError;
use pro_common::{ApplicationStatus, Delta, LifecycleState};
use serde_json::json;

#[test]
fn test_blocked_affordance_never_touches_tooling() {
    let bed = Bed::builder()
        .host(|h| h.container = true)
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let outcome = bed.engine.enable("livepatch").unwrap();

    assert!(!outcome.success);
    match outcome.reason {
        Some(EnableFailure::Blocked(msg)) => {
            assert_eq!(msg.name, "livepatch-error-install-on-container")
        }
        other => panic!("unexpected reason {:?}", other),
    }
    assert!(bed.log.calls().is_empty(), "calls: {:?}", bed.log.calls());
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Disabled);
}

#[test]
fn test_enable_then_status_reports_enabled() {
    let bed = Bed::builder()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let outcome = bed.engine.enable("livepatch").unwrap();
    assert!(outcome.success, "{:?}", outcome.human_reason());

    let (status, warning) = bed.engine.status("livepatch").unwrap();
    assert_eq!(status, ApplicationStatus::Enabled);
    assert!(warning.is_none());
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Enabled);
    assert!(bed.events.contains("Livepatch enabled"));
}

#[test]
fn test_trust_material_applied_before_endpoint() {
    let bed = Bed::builder()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    bed.engine.enable("livepatch").unwrap();

    assert_eq!(
        bed.log.calls(),
        vec![
            "snap wait",
            "snap install canonical-livepatch",
            "livepatch configure ca-certs=-----BEGIN CERT-----",
            "livepatch configure remote-server=https://livepatch.example.com",
            "livepatch attach lp-tok",
        ]
    );
}

#[test]
fn test_machine_token_used_without_resource_token() {
    let bed = Bed::builder()
        .entitled(
            "livepatch",
            access(json!({"entitlement": {"entitled": true}})),
        )
        .build();

    assert!(bed.engine.enable("livepatch").unwrap().success);
    assert_eq!(
        bed.log.calls_for("livepatch attach"),
        vec![format!("livepatch attach {}", MACHINE_TOKEN)]
    );
}

#[test]
fn test_disable_twice_is_idempotent() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled())
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    assert!(bed.engine.disable("livepatch").unwrap());
    assert!(bed.engine.disable("livepatch").unwrap());

    assert_eq!(bed.log.calls(), vec!["livepatch detach"]);
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Disabled);
    assert_eq!(
        bed.engine.status("livepatch").unwrap().0,
        ApplicationStatus::Disabled
    );
}

#[test]
fn test_failed_detach_reports_false() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled().failing_detach())
        .build();

    assert!(!bed.engine.disable("livepatch").unwrap());
    assert!(!bed.events.contains("Livepatch disabled"));
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Enabled);
    assert_eq!(
        bed.engine.status("livepatch").unwrap().0,
        ApplicationStatus::Enabled
    );
}

#[test]
fn test_auto_disable_incompatible_service() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled())
        .entitled("realtime-kernel", entitled_access("rt-tok"))
        .options(|o| o.allow_auto_disable = true)
        .build();

    let outcome = bed.engine.enable("realtime-kernel").unwrap();
    assert!(outcome.success, "{:?}", outcome.human_reason());

    assert_eq!(
        bed.log.calls(),
        vec!["livepatch detach", "realtime-kernel attach rt-tok"]
    );
    assert_eq!(
        bed.engine.status("livepatch").unwrap().0,
        ApplicationStatus::Disabled
    );
    assert_eq!(
        bed.engine.status("realtime-kernel").unwrap().0,
        ApplicationStatus::Enabled
    );
    assert!(bed.events.contains("Disabling incompatible service: Livepatch"));
}

#[test]
fn test_incompatible_service_blocks_without_auto_disable() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled())
        .entitled("realtime-kernel", entitled_access("rt-tok"))
        .build();

    let outcome = bed.engine.enable("realtime-kernel").unwrap();

    match &outcome.reason {
        Some(EnableFailure::Incompatible { blockers, .. }) => {
            let names: Vec<&str> = blockers.iter().map(|b| b.name).collect();
            assert_eq!(names, vec!["livepatch"]);
        }
        other => panic!("unexpected reason {:?}", other),
    }
    assert!(bed.log.calls().is_empty());
    assert_eq!(
        bed.engine.status("livepatch").unwrap().0,
        ApplicationStatus::Enabled
    );
}

#[test]
fn test_auto_disable_failure_stops_enable() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled().failing_detach())
        .entitled("realtime-kernel", entitled_access("rt-tok"))
        .options(|o| o.allow_auto_disable = true)
        .build();

    let outcome = bed.engine.enable("realtime-kernel").unwrap();

    assert!(matches!(
        outcome.reason,
        Some(EnableFailure::AutoDisableFailed(_))
    ));
    assert!(bed.log.calls_for("realtime-kernel").is_empty());
}

#[test]
fn test_token_rotation_reattaches() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled())
        .entitled("livepatch", livepatch_access("old-tok"))
        .build();

    let original = livepatch_access("old-tok");
    let delta = Delta::default().with_token("tok123");
    let mutated = bed
        .engine
        .process_contract_deltas("livepatch", &original, &delta, false)
        .unwrap();

    assert!(mutated);
    assert_eq!(
        bed.log.calls(),
        vec!["livepatch detach", "livepatch attach tok123"]
    );
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Enabled);
}

#[test]
fn test_directive_delta_reapplies_directives_without_reattach() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled())
        .build();

    let original = livepatch_access("lp-tok");
    let delta = Delta::default().with_directive(
        "remoteServer",
        json!("https://livepatch.staging.example.com/"),
    );
    let mutated = bed
        .engine
        .process_contract_deltas("livepatch", &original, &delta, false)
        .unwrap();

    assert!(mutated);
    assert_eq!(
        bed.log.calls(),
        vec![
            "livepatch configure ca-certs=-----BEGIN CERT-----",
            "livepatch configure remote-server=https://livepatch.staging.example.com",
        ]
    );
}

#[test]
fn test_delta_for_disabled_service_is_noop() {
    let bed = Bed::builder().build();

    let original = livepatch_access("lp-tok");
    let delta = Delta::default()
        .with_directive("caCerts", json!("new-cert"))
        .with_token("tok123");
    let mutated = bed
        .engine
        .process_contract_deltas("livepatch", &original, &delta, true)
        .unwrap();

    assert!(!mutated);
    assert!(bed.log.calls().is_empty());
}

#[test]
fn test_enabled_by_default_enables_when_allowed() {
    let bed = Bed::builder()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let original = livepatch_access("lp-tok");
    let delta = Delta::default().with_enabled_by_default(true);
    let mutated = bed
        .engine
        .process_contract_deltas("livepatch", &original, &delta, true)
        .unwrap();

    assert!(mutated);
    assert_eq!(
        bed.engine.status("livepatch").unwrap().0,
        ApplicationStatus::Enabled
    );
}

#[test]
fn test_enabled_by_default_only_recommends_when_not_allowed() {
    let bed = Bed::builder()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let original = livepatch_access("lp-tok");
    let delta = Delta::default().with_enabled_by_default(true);
    let mutated = bed
        .engine
        .process_contract_deltas("livepatch", &original, &delta, false)
        .unwrap();

    assert!(!mutated);
    assert!(bed.log.calls().is_empty());
    assert!(bed.events.contains("proctl enable livepatch"));
}

#[test]
fn test_revoked_entitlement_disables_service() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled())
        .build();

    let original = livepatch_access("lp-tok");
    let delta = Delta {
        entitled: Some(false),
        ..Delta::default()
    };
    let mutated = bed
        .engine
        .process_contract_deltas("livepatch", &original, &delta, false)
        .unwrap();

    assert!(mutated);
    assert_eq!(bed.log.calls(), vec!["livepatch detach"]);
}

#[test]
fn test_failed_targeted_apply_keeps_service_enabled() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled().failing_configure("bad certificate"))
        .build();

    let original = livepatch_access("lp-tok");
    let delta = Delta::default().with_directive("caCerts", json!("rotated-cert"));
    let mutated = bed
        .engine
        .process_contract_deltas("livepatch", &original, &delta, false)
        .unwrap();

    assert!(!mutated);
    assert!(bed
        .events
        .contains("Unable to configure Livepatch: bad certificate"));
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Enabled);
}

#[test]
fn test_indeterminate_probe_reports_client_failure() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.indeterminate())
        .build();

    let (status, warning) = bed.engine.status("livepatch").unwrap();

    assert_eq!(status, ApplicationStatus::Disabled);
    assert_eq!(warning.map(|w| w.name), Some("client-failure".to_string()));
}

#[test]
fn test_unsupported_kernel_is_a_warning_only() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled().unsupported_kernel())
        .build();

    let report = bed.engine.status_report("livepatch").unwrap();

    assert_eq!(report.status, ApplicationStatus::Enabled);
    assert_eq!(
        report.warning.map(|w| w.msg),
        Some("The current kernel (5.15.0-88-generic, amd64) is not supported by livepatch.".to_string())
    );
    assert!(report.description_override.is_some());
}

#[test]
fn test_reboot_required_reports_pending() {
    let bed = Bed::builder()
        .tool("fips", |t| t.enabled().reboot_required())
        .entitled("fips", entitled_access("fips-tok"))
        .build();

    let (status, warning) = bed.engine.status("fips").unwrap();
    assert_eq!(status, ApplicationStatus::Pending);
    assert_eq!(warning.map(|w| w.name), Some("reboot-required".to_string()));

    let outcome = bed.engine.enable("fips").unwrap();
    assert!(matches!(
        outcome.reason,
        Some(EnableFailure::AlreadyEnabled(_))
    ));
}

#[test]
fn test_snapd_installed_when_missing() {
    let bed = Bed::builder()
        .without_snapd()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    assert!(bed.engine.enable("livepatch").unwrap().success);

    let calls = bed.log.calls();
    assert_eq!(
        &calls[..4],
        &[
            "apt update",
            "apt install snapd",
            "snap wait",
            "snap install canonical-livepatch"
        ]
    );
    assert!(bed.events.contains("Installing snapd"));
}

#[test]
fn test_snapd_install_failure() {
    let bed = Bed::builder()
        .without_snapd()
        .apt_fails()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let outcome = bed.engine.enable("livepatch").unwrap();

    assert!(matches!(
        outcome.reason,
        Some(EnableFailure::Install(InstallError::CannotInstallSnapd))
    ));
    assert!(bed.log.calls_for("livepatch").is_empty());
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Disabled);
}

#[test]
fn test_snap_command_without_snapd_package() {
    let bed = Bed::builder()
        .broken_snapd()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let outcome = bed.engine.enable("livepatch").unwrap();

    assert!(matches!(
        outcome.reason,
        Some(EnableFailure::Install(
            InstallError::SnapdNotProperlyInstalled { .. }
        ))
    ));
}

#[test]
fn test_old_snapd_without_wait_command_continues() {
    let bed = Bed::builder()
        .snap_wait_fails("error: unknown command \"wait\", see 'snap help'.")
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    assert!(bed.engine.enable("livepatch").unwrap().success);
    assert!(bed.events.contains("snapd does not have wait command"));
}

#[test]
fn test_proxies_pushed_to_snapd_and_tool() {
    let bed = Bed::builder()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .options(|o| o.https_proxy = Some("http://proxy:3128".to_string()))
        .build();

    assert!(bed.engine.enable("livepatch").unwrap().success);
    assert!(bed
        .log
        .calls()
        .contains(&"snap proxy - http://proxy:3128".to_string()));
    assert!(bed
        .log
        .calls()
        .contains(&"livepatch configure https-proxy=http://proxy:3128".to_string()));
}

#[test]
fn test_not_entitled() {
    let bed = Bed::builder().build();

    let outcome = bed.engine.enable("livepatch").unwrap();

    assert!(matches!(
        outcome.reason,
        Some(EnableFailure::NotEntitled(_))
    ));
    assert_eq!(
        outcome.human_reason().as_deref(),
        Some("This subscription is not entitled to Livepatch")
    );
    assert!(bed.log.calls().is_empty());
}

#[test]
fn test_already_enabled_makes_no_calls() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.enabled())
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let outcome = bed.engine.enable("livepatch").unwrap();

    assert_eq!(
        outcome.human_reason().as_deref(),
        Some("Livepatch is already enabled.")
    );
    assert!(bed.log.calls().is_empty());
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Enabled);
}

#[test]
fn test_attach_error_is_classified() {
    let bed = Bed::builder()
        .tool("livepatch", |t| t.failing_attach("error: Unknown Auth-Token"))
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let outcome = bed.engine.enable("livepatch").unwrap();

    assert_eq!(
        outcome.human_reason().as_deref(),
        Some("Unable to enable Livepatch: Invalid Auth-Token provided to livepatch.")
    );
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Disabled);
}

#[test]
fn test_fips_blocked_after_fips_updates_was_once_enabled() {
    let bed = Bed::builder()
        .entitled("fips", entitled_access("fips-tok"))
        .entitled("fips-updates", entitled_access("fu-tok"))
        .build();

    assert!(bed.engine.enable("fips-updates").unwrap().success);
    assert!(bed.engine.disable("fips-updates").unwrap());

    let outcome = bed.engine.enable("fips").unwrap();

    match outcome.reason {
        Some(EnableFailure::Blocked(msg)) => assert_eq!(
            msg.msg,
            "Cannot enable FIPS because FIPS Updates was once enabled."
        ),
        other => panic!("unexpected reason {:?}", other),
    }
}

#[test]
fn test_fips_blocked_by_recorded_fips_updates_history() {
    let bed = Bed::builder()
        .once_enabled(&["fips-updates"])
        .entitled("fips", entitled_access("fips-tok"))
        .build();

    let outcome = bed.engine.enable("fips").unwrap();

    match outcome.reason {
        Some(EnableFailure::Blocked(msg)) => {
            assert_eq!(msg.name, "fips-enable-when-fips-updates-once-enabled")
        }
        other => panic!("unexpected reason {:?}", other),
    }
    assert!(bed.log.calls().is_empty());
}

#[test]
fn test_fips_blocked_on_gcp_jammy() {
    let bed = Bed::builder()
        .host(|h| h.cloud = Some("gce".to_string()))
        .entitled("fips", entitled_access("fips-tok"))
        .build();

    let outcome = bed.engine.enable("fips").unwrap();

    assert_eq!(
        outcome.human_reason().as_deref(),
        Some("Ubuntu Jammy does not provide a GCP optimized FIPS kernel")
    );
}

#[test]
fn test_contract_series_restriction() {
    let bed = Bed::builder()
        .entitled(
            "realtime-kernel",
            access(json!({
                "entitlement": {
                    "entitled": true,
                    "affordances": {"series": ["jammy"]}
                },
                "resourceToken": "rt-tok"
            })),
        )
        .host(|h| h.series = "focal".to_string())
        .build();

    let outcome = bed.engine.enable("realtime-kernel").unwrap();

    assert_eq!(
        outcome.human_reason().as_deref(),
        Some("Real-time kernel is not available for Ubuntu focal.")
    );
}

#[test]
fn test_unknown_entitlement_is_an_error() {
    let bed = Bed::builder().build();
    assert!(bed.engine.enable("esm-apps").is_err());
    assert!(bed.engine.disable("esm-apps").is_err());
}

#[test]
fn test_concurrent_enables_attach_once() {
    let bed = Bed::builder()
        .entitled("livepatch", livepatch_access("lp-tok"))
        .build();

    let outcomes: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| bed.engine.enable("livepatch").unwrap().success))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(bed.log.calls_for("livepatch attach").len(), 1);
    assert_eq!(bed.engine.state("livepatch"), LifecycleState::Enabled);
}
