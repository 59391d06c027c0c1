//! Logging bootstrap for processes embedding the sale.
//!
//! `tracing` + `tracing-subscriber`: EnvFilter directives, text or JSON output,
//! RFC 3339 UTC timestamps. Call once at process start.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// RUST_LOG style directives, e.g. "info,ubermensch_presale=debug".
    pub log_level: String,
    pub json: bool,
    pub with_targets: bool,
    /// Colors; text format only.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { log_level: "info".into(), json: true, with_targets: true, ansi: false }
    }
}

#[derive(Error, Debug)]
#[error("telemetry error: {0}")]
pub struct TelemetryError(String);

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(cfg: &TelemetryConfig) -> Result<(), TelemetryError> {
    let fmt_layer = if cfg.json {
        fmt::layer()
            .json()
            .with_target(cfg.with_targets)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .boxed()
    } else {
        fmt::layer()
            .with_target(cfg.with_targets)
            .with_ansi(cfg.ansi)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .boxed()
    };

    Registry::default()
        .with(env_filter(&cfg.log_level))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError(format!("set global subscriber: {e}")))
}
