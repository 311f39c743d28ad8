//! Exit codes and fatal messages for proctl

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for any failure
pub const EXIT_FAILURE: i32 = 1;

pub const ROOT_REQUIRED: &str = "This command must be run as root (try using sudo).";

pub const NOT_ATTACHED: &str = "This machine is not attached to a subscription.";

/// Fold per-service results into one exit code
pub fn exit_code(all_ok: bool) -> i32 {
    if all_ok {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}
