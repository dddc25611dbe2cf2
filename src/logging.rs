//! Log output setup.
//!
//! The library itself only emits through the `log` macros. Applications call
//! [`init`] once to print those records with `tracing-subscriber`.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// Filtering follows `RUST_LOG` when it is set, otherwise `default_directive`
/// (e.g. `"info"` or `"resume_match=debug"`). Returns `false` when a global
/// subscriber was already installed, in which case nothing changes.
pub fn init(default_directive: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_ok()
}
