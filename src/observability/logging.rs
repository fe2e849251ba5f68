//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Derive the default filter from config; `RUST_LOG` wins when set

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter used when `RUST_LOG` is not set.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    format!(
        "blog_server={},tower_http={}",
        config.log_level.to_ascii_lowercase(),
        config.log_level.to_ascii_lowercase()
    )
}

/// Install the global subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(config).into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_follow_configured_level() {
        let config = ObservabilityConfig {
            log_level: "DEBUG".into(),
            ..Default::default()
        };
        assert_eq!(default_directives(&config), "blog_server=debug,tower_http=debug");
    }
}
