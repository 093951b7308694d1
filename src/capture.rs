use crate::attr::Attr;
use crate::context::LogContext;
use crate::handler::{HandleError, Handler, Scoped};
use crate::record::LogRecord;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Level;

/// Error produced by a [`CaptureHandler`] configured with
/// [`CaptureHandler::failing`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("capture handler rejected record: {0}")]
pub struct CaptureError(pub String);

/// Terminal handler that keeps every record it receives in memory.
///
/// Clones and derived handlers share one buffer, so a test can keep the
/// root handle and inspect what any derived handler received.
#[derive(Clone, Default)]
pub struct CaptureHandler {
    records: Arc<Mutex<Vec<LogRecord>>>,
    scoped: Scoped,
    failure: Option<CaptureError>,
}

impl CaptureHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that records nothing and fails every `handle` call.
    pub fn failing(reason: impl Into<String>) -> Self {
        CaptureHandler {
            failure: Some(CaptureError(reason.into())),
            ..Self::default()
        }
    }

    /// Snapshot of the records handled so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attributes of the most recent record, if any.
    pub fn last_attrs(&self) -> Option<Vec<Attr>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|r| r.attrs.clone())
    }

    fn derive(&self, scoped: Scoped) -> Arc<dyn Handler> {
        Arc::new(CaptureHandler {
            records: Arc::clone(&self.records),
            scoped,
            failure: self.failure.clone(),
        })
    }
}

impl Handler for CaptureHandler {
    fn enabled(&self, _ctx: &LogContext, _level: Level) -> bool {
        true
    }

    fn handle(&self, _ctx: &LogContext, record: LogRecord) -> Result<(), HandleError> {
        if let Some(err) = &self.failure {
            return Err(Box::new(err.clone()));
        }
        let record = self.scoped.apply(record);
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler> {
        self.derive(self.scoped.with_attrs(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        self.derive(self.scoped.with_group(name))
    }
}
