use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};

/// A sink that drops all records, counting how many it was given.
///
/// Useful for measuring the cost of composition and batching without any
/// I/O.
#[derive(Default)]
pub struct NoopSink {
    received: AtomicU64,
}

impl NoopSink {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
