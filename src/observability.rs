// src/observability.rs
//! Logging and metrics setup
//!
//! The engine runs inside a foreign process, so subscriber installation never
//! fails hard: if the host already set a global subscriber ours is dropped.

use crate::utils::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Mocked connections accepted, labeled by endpoint
pub const METRIC_MOCKED_CONNECTS: &str = "serverless_mocked_connects_total";

/// Frames decoded from client sends, labeled by message type
pub const METRIC_FRAMES: &str = "serverless_frames_total";

/// Bytes handed back to the client through recv
pub const METRIC_BYTES_DELIVERED: &str = "serverless_bytes_delivered_total";

/// Calls forwarded to the real socket functions, labeled by call
pub const METRIC_PASSTHROUGH_CALLS: &str = "serverless_passthrough_calls_total";

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false` when
/// a global subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_thread_ids(true).with_target(true))
            .try_init()
    };

    result.is_ok()
}

/// Register metric descriptions with whatever recorder the host installed
pub fn describe_metrics() {
    metrics::describe_counter!(METRIC_MOCKED_CONNECTS, "Connections diverted to the emulation");
    metrics::describe_counter!(METRIC_FRAMES, "Frames decoded from client sends");
    metrics::describe_counter!(METRIC_BYTES_DELIVERED, "Bytes delivered through recv");
    metrics::describe_counter!(METRIC_PASSTHROUGH_CALLS, "Calls forwarded to real sockets");
}
