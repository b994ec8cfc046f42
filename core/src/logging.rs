//! Tracing setup for hosts embedding the core.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the host binary. `init` is a convenience for hosts that are happy with
//! the fmt layer filtered by `RUST_LOG` or the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter directive used when `RUST_LOG` is not set.
pub fn directive_for(config: &LoggingConfig) -> String {
    if !config.enabled {
        return "off".to_string();
    }
    format!("cc_core={}", config.level)
}

/// Install a global fmt subscriber. Returns `false` if one was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = if config.enabled {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| directive_for(config).into())
    } else {
        EnvFilter::new("off")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
