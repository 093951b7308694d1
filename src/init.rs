use crate::handler::Handler;
use crate::layer::AttrLayer;
use crate::middleware::ContextHandler;
use crate::sink::LogSink;
use crate::sink_handler::{SinkHandler, SinkTask};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging pipeline.
///
/// **Fields**
/// - `channel_buffer`: records queued for the sink before new ones are
///   dropped.
/// - `batch_size`: records sent to the sink per batch.
/// - `flush_interval`: longest time a partial batch waits.
/// - `max_retries`: failed sends retried per batch before it is dropped.
/// - `max_level`: most verbose level forwarded to the sink.
/// - `enable_stdout`: also print events through a `fmt` layer.
/// - `span_groups`: nest event attributes under a group per enclosing span.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub max_level: LevelFilter,
    pub enable_stdout: bool,
    pub span_groups: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_retries: 5,
            max_level: LevelFilter::INFO,
            enable_stdout: true,
            span_groups: false,
        }
    }
}

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Build the handler pipeline used by [`init_tracing_with_config`]:
/// [`ContextHandler`] in front of a [`SinkHandler`] driving `sink`.
///
/// Must be called within a Tokio runtime, which runs the sink task.
pub fn build_handler(
    sink: Arc<dyn LogSink>,
    config: &LayerConfig,
) -> (Arc<dyn Handler>, SinkTask) {
    let (sink_handler, task) = SinkHandler::new(sink, config);
    let handler = ContextHandler::new(Arc::new(sink_handler));
    (Arc::new(handler), task)
}

/// Install a global subscriber routing every `tracing` event through
/// `handler`.
pub fn init_tracing_with_handler(
    handler: Arc<dyn Handler>,
    config: &LayerConfig,
) -> Result<(), InitError> {
    let layer = AttrLayer::new(handler).with_span_groups(config.span_groups);

    // Two branches because the subscriber type differs with the extra layer.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Initialize the global `tracing` subscriber with `sink` as destination.
///
/// **Returns**
/// - the [`SinkTask`] feeding `sink`. The global subscriber keeps its
///   handler alive for the whole process, so call
///   [`SinkTask::shutdown`] before exiting to deliver pending records;
/// - [`InitError`] if a global subscriber was already set.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<SinkTask, InitError> {
    let (handler, task) = build_handler(sink, &config);
    if let Err(e) = init_tracing_with_handler(handler, &config) {
        task.abort();
        return Err(e);
    }
    Ok(task)
}

/// Equivalent to [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<SinkTask, InitError> {
    init_tracing_with_config(sink, LayerConfig::default())
}
