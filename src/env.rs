//! Environment variable names read by [`LayerConfig::from_env`].
//!
//! Unset or unparsable variables fall back to [`LayerConfig::default`].

use crate::init::LayerConfig;
use std::str::FromStr;
use tokio::time::Duration;

/// Channel capacity between handlers and the sink task.
pub const CTX_ATTRS_CHANNEL_BUFFER_ENV: &str = "CTX_ATTRS_CHANNEL_BUFFER";

/// Records per batch sent to the sink.
pub const CTX_ATTRS_BATCH_SIZE_ENV: &str = "CTX_ATTRS_BATCH_SIZE";

/// Flush interval in milliseconds.
pub const CTX_ATTRS_FLUSH_INTERVAL_MS_ENV: &str = "CTX_ATTRS_FLUSH_INTERVAL_MS";

/// Retries per batch before it is dropped.
pub const CTX_ATTRS_MAX_RETRIES_ENV: &str = "CTX_ATTRS_MAX_RETRIES";

/// Most verbose level forwarded, e.g. `debug` or `warn`.
pub const CTX_ATTRS_LEVEL_ENV: &str = "CTX_ATTRS_LEVEL";

/// `true` / `false`: mirror events to the console.
pub const CTX_ATTRS_STDOUT_ENV: &str = "CTX_ATTRS_STDOUT";

/// `true` / `false`: open a group per enclosing span.
pub const CTX_ATTRS_SPAN_GROUPS_ENV: &str = "CTX_ATTRS_SPAN_GROUPS";

/// Parse an environment variable, falling back to `default` when it is
/// missing or invalid.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

impl LayerConfig {
    /// [`LayerConfig::default`] overridden by the `CTX_ATTRS_*` variables.
    pub fn from_env() -> Self {
        let defaults = LayerConfig::default();
        let flush_ms = env_parse(
            CTX_ATTRS_FLUSH_INTERVAL_MS_ENV,
            defaults.flush_interval.as_millis() as u64,
        );
        LayerConfig {
            channel_buffer: env_parse(CTX_ATTRS_CHANNEL_BUFFER_ENV, defaults.channel_buffer),
            batch_size: env_parse(CTX_ATTRS_BATCH_SIZE_ENV, defaults.batch_size),
            flush_interval: Duration::from_millis(flush_ms),
            max_retries: env_parse(CTX_ATTRS_MAX_RETRIES_ENV, defaults.max_retries),
            max_level: env_parse(CTX_ATTRS_LEVEL_ENV, defaults.max_level),
            enable_stdout: env_parse(CTX_ATTRS_STDOUT_ENV, defaults.enable_stdout),
            span_groups: env_parse(CTX_ATTRS_SPAN_GROUPS_ENV, defaults.span_groups),
        }
    }
}
