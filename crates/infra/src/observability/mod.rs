//! Logging setup
//!
//! Installs a global `tracing-subscriber` `fmt` subscriber. The filter comes
//! from `RUST_LOG` when set, otherwise from [`LoggingSettings::level`].
//!
//! ```no_run
//! use authflow_infra::{init_tracing, LoggingSettings};
//!
//! init_tracing(&LoggingSettings { level: "authflow_common=debug".into(), json: false });
//! tracing::info!("ready");
//! ```

use tracing_subscriber::EnvFilter;

use crate::config::{LoggingSettings, DEFAULT_LOG_DIRECTIVE};

/// Install the global subscriber.
///
/// Returns `false` when a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let filter = build_filter(settings);
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed =
        if settings.json { builder.json().try_init() } else { builder.try_init() }.is_ok();

    if installed {
        tracing::debug!(level = %settings.level, json = settings.json, "tracing initialized");
    }
    installed
}

fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
}
