use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for composed [`LogRecord`]s.
///
/// Implementations own encoding and transport (stdout, a database, a
/// collector). [`SinkHandler`](crate::sink_handler::SinkHandler) calls
/// `send` from its background task, never from the thread that logged.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single record.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the record.
    /// - `Err(..)` on any backend failure. The whole batch is retried with
    ///   backoff, up to the configured number of attempts.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush buffered records. Called once when the handler shuts down.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
