//! Tracing subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

use crate::cli::LogFormat;

/// Install the global subscriber: `RUST_LOG` filter (default `info`) and a fmt layer.
pub fn init(format: LogFormat) -> Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = Registry::default().with(filter_layer);

    let installed = match format {
        LogFormat::Text => {
            let subscriber = registry.with(fmt::layer().with_target(false));
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Json => {
            let subscriber = registry.with(fmt::layer().json().with_target(false));
            tracing::subscriber::set_global_default(subscriber)
        }
    };
    installed.context("Failed to set global tracing subscriber")
}
